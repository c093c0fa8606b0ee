use std::backtrace::Backtrace;

use snafu::{IntoError, Snafu};

use crate::types::IdentifierError;

/// Decode/encode failures for the wire protocol (C1). Every variant here
/// is a *malformed frame*: the caller must close the offending
/// connection (and, if paired, the pairing) rather than try to
/// resynchronize.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProtoError {
    #[snafu(display("expected version byte 0x01, got {version:#04x}"))]
    VersionMismatch { version: u8, backtrace: Backtrace },

    #[snafu(display("unknown identifier type byte {value}"))]
    UnknownIdentifierType { value: u8, backtrace: Backtrace },

    #[snafu(display("unknown status byte {value}"))]
    UnknownStatus { value: u8, backtrace: Backtrace },

    #[snafu(display("unknown APDU op byte {value}"))]
    UnknownApduOp { value: u8, backtrace: Backtrace },

    #[snafu(display("record has wrong length: expected {expected}, got {actual}"))]
    WrongLength {
        expected: usize,
        actual: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("APDU payload length {plen} exceeds the 65535 byte cap"))]
    PayloadTooLarge { plen: u32, backtrace: Backtrace },

    #[snafu(display("invalid SIM identifier: {source}"))]
    Identifier {
        source: IdentifierError,
        backtrace: Backtrace,
    },

    #[snafu(display("I/O error while decoding"))]
    Io {
        source: std::io::Error,
        backtrace: Backtrace,
    },
}

impl From<std::io::Error> for ProtoError {
    fn from(source: std::io::Error) -> Self {
        IoSnafu.into_error(source)
    }
}

impl From<IdentifierError> for ProtoError {
    fn from(source: IdentifierError) -> Self {
        IdentifierSnafu.into_error(source)
    }
}
