//! `ConnectRequest`/`ConnectResponse` records.
//!
//! `ConnectRequest`: `0x01 ‖ id_type[1] ‖ id_bytes[15 or 20]` (17 or 22
//! bytes total). The decoder must inspect byte 1 (the identifier type)
//! before it knows the total record length — [`ConnectRequestCodec`]
//! mirrors that by returning `Ok(None)` until enough bytes to make that
//! decision, and then again until the type-specific length arrives.
//!
//! `ConnectResponse`: `0x01 ‖ status[1]` (2 bytes total).

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::VERSION;
use crate::{
    proto::error::{ProtoError, UnknownIdentifierTypeSnafu},
    types::{ConnectStatus, Iccid, IdentifierType, Imsi, SimIdentifier},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub identifier: SimIdentifier,
}

impl ConnectRequest {
    /// Shortest possible encoding: type byte + the Imsi's 15-byte body.
    pub const MIN_LEN: usize = 2 + Imsi::WIRE_LEN;

    /// How many more bytes are needed to finish decoding this record,
    /// given what has arrived so far.
    fn missing(buf: &[u8]) -> usize {
        if buf.len() < 2 {
            return Self::MIN_LEN - buf.len();
        }
        match IdentifierType::from(buf[1]) {
            IdentifierType::Imsi => (2 + Imsi::WIRE_LEN).saturating_sub(buf.len()),
            IdentifierType::Iccid => (2 + Iccid::WIRE_LEN).saturating_sub(buf.len()),
            IdentifierType::Other(_) => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectRequestCodec;

impl Decoder for ConnectRequestCodec {
    type Error = ProtoError;
    type Item = ConnectRequest;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 2 {
            return Ok(None);
        }
        let missing = ConnectRequest::missing(src);
        if missing > 0 {
            return Ok(None);
        }

        let id_type = IdentifierType::from(src[1]);
        let total_len = match id_type {
            IdentifierType::Imsi => 2 + Imsi::WIRE_LEN,
            IdentifierType::Iccid => 2 + Iccid::WIRE_LEN,
            IdentifierType::Other(value) => return UnknownIdentifierTypeSnafu { value }.fail(),
        };

        let mut buf = src.split_to(total_len);
        super::expect_version(buf.get_u8())?;
        let _id_type = buf.get_u8();

        let identifier = match id_type {
            IdentifierType::Imsi => {
                let mut body = [0u8; Imsi::WIRE_LEN];
                buf.copy_to_slice(&mut body);
                SimIdentifier::Imsi(Imsi::decode_padded(&body)?)
            }
            IdentifierType::Iccid => {
                let mut body = [0u8; Iccid::WIRE_LEN];
                buf.copy_to_slice(&mut body);
                SimIdentifier::Iccid(Iccid::decode_padded(&body)?)
            }
            IdentifierType::Other(_) => unreachable!("handled above"),
        };

        Ok(Some(ConnectRequest { identifier }))
    }
}

impl Encoder<ConnectRequest> for ConnectRequestCodec {
    type Error = ProtoError;

    fn encode(&mut self, item: ConnectRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_u8(VERSION);
        dst.put_u8(item.identifier.identifier_type().into());
        match item.identifier {
            SimIdentifier::Imsi(imsi) => dst.put_slice(&imsi.encode_padded()),
            SimIdentifier::Iccid(iccid) => dst.put_slice(&iccid.encode_padded()),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectResponse {
    pub status: ConnectStatus,
}

impl ConnectResponse {
    pub const LEN: usize = 2;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectResponseCodec;

impl Decoder for ConnectResponseCodec {
    type Error = ProtoError;
    type Item = ConnectResponse;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < ConnectResponse::LEN {
            return Ok(None);
        }
        let mut buf = src.split_to(ConnectResponse::LEN);
        super::expect_version(buf.get_u8())?;
        let status = ConnectStatus::from(buf.get_u8());
        Ok(Some(ConnectResponse { status }))
    }
}

impl Encoder<ConnectResponse> for ConnectResponseCodec {
    type Error = ProtoError;

    fn encode(&mut self, item: ConnectResponse, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(ConnectResponse::LEN);
        dst.put_u8(VERSION);
        dst.put_u8(item.status.into());
        Ok(())
    }
}
