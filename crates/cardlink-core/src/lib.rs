//! Wire codec, framed stream and relay primitives shared by the tunnel
//! broker and its registry collaborator.

pub mod log;
pub mod proto;
pub mod relay;
pub mod stream;
pub mod types;

use tokio::io::{AsyncRead, AsyncWrite};

/// Any byte-oriented transport the tunnel can speak the wire protocol
/// over — a plain `TcpStream` or a TLS-wrapped one. Lets the listener
/// hand both kinds to the same connection-handling code via `Box<dyn
/// AbstractTcpStream>`.
pub trait AbstractTcpStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AbstractTcpStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}
