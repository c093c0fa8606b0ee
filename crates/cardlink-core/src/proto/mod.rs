//! Wire codec (C1): every record on the wire begins with version byte
//! `0x01`; any other value is a fatal decode error.

pub mod apdu;
pub mod auth;
pub mod connect;
pub mod error;

pub use apdu::{ApduPacket, ApduPacketCodec, MAX_PAYLOAD_LEN};
pub use auth::{AuthRequest, AuthRequestCodec, AuthResponse, AuthResponseCodec};
pub use connect::{ConnectRequest, ConnectRequestCodec, ConnectResponse, ConnectResponseCodec};
pub use error::ProtoError;

use error::VersionMismatchSnafu;

/// The only version this implementation speaks or accepts.
pub const VERSION: u8 = 0x01;

fn expect_version(version: u8) -> Result<(), ProtoError> {
    if version != VERSION {
        return VersionMismatchSnafu { version }.fail();
    }
    Ok(())
}
