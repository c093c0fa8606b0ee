//! Auth handshake (C3).

use std::time::Duration;

use cardlink_core::{
    proto::{AuthRequestCodec, AuthResponse, AuthResponseCodec, auth::AuthRequest},
    stream::FramedStream,
    types::{AuthStatus, SessionToken},
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Encoder;
use tracing::warn;

use crate::{error::TunnelError, registry::SimRegistry};

/// Recommended handshake timeout.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the auth handshake on a freshly accepted (and optionally
/// TLS-wrapped) connection. Returns the validated session token on
/// success; on any non-`Success` status the response has already been
/// written and the caller must close the socket.
pub async fn authenticate<T, R>(
    stream: &mut FramedStream<T>,
    registry: &R,
    timeout: Duration,
) -> Result<SessionToken, TunnelError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    R: SimRegistry,
{
    let mut decoder = AuthRequestCodec;
    let request = tokio::time::timeout(timeout, stream.read_record(&mut decoder))
        .await
        .map_err(|_| crate::error::AuthTimeoutSnafu.build())??
        .ok_or_else(|| crate::error::HandshakeClosedSnafu.build())?;

    let status = registry.token_valid(&request.session_token).await;
    write_response(stream, status).await?;

    if status != AuthStatus::Success {
        warn!(?status, "auth handshake rejected");
        return Err(status_error(status));
    }

    Ok(request.session_token)
}

async fn write_response<T>(
    stream: &mut FramedStream<T>,
    status: AuthStatus,
) -> Result<(), TunnelError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut buf = bytes::BytesMut::new();
    AuthResponseCodec
        .encode(AuthResponse { status }, &mut buf)
        .map_err(TunnelError::from)?;
    stream.write_all(&buf).await?;
    Ok(())
}

fn status_error(status: AuthStatus) -> TunnelError {
    // The handshake has already told the peer why; the caller only needs
    // to know to stop. HandshakeClosed doubles as "rejected and closed".
    let _ = status;
    crate::error::HandshakeClosedSnafu.build()
}
