use std::backtrace::Backtrace;

use cardlink_core::proto::ProtoError;
use snafu::{IntoError, Snafu};

use crate::registry::RegistryError;

/// Failures surfaced by the tunnel (C3/C5/C7). One side's error never
/// corrupts the other side's framing: callers are expected
/// to tear down only the connection or pairing this error belongs to.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TunnelError {
    #[snafu(display("wire protocol error: {source}"))]
    Proto {
        source: ProtoError,
        backtrace: Backtrace,
    },

    #[snafu(display("transport error: {source}"))]
    Io {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("registry error: {source}"))]
    Registry {
        source: RegistryError,
        backtrace: Backtrace,
    },

    #[snafu(display("auth handshake timed out"))]
    AuthTimeout { backtrace: Backtrace },

    #[snafu(display("peer closed before completing the handshake"))]
    HandshakeClosed { backtrace: Backtrace },
}

impl From<std::io::Error> for TunnelError {
    fn from(source: std::io::Error) -> Self {
        IoSnafu.into_error(source)
    }
}

impl From<ProtoError> for TunnelError {
    fn from(source: ProtoError) -> Self {
        ProtoSnafu.into_error(source)
    }
}

impl From<RegistryError> for TunnelError {
    fn from(source: RegistryError) -> Self {
        RegistrySnafu.into_error(source)
    }
}

impl<E> From<cardlink_core::stream::RecordError<E>> for TunnelError
where
    ProtoError: From<E>,
{
    fn from(source: cardlink_core::stream::RecordError<E>) -> Self {
        match source {
            cardlink_core::stream::RecordError::Io(err) => err.into(),
            cardlink_core::stream::RecordError::Decode(err) => ProtoError::from(err).into(),
        }
    }
}
