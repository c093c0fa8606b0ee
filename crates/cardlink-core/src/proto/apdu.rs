//! `ApduPacket` record.
//!
//! `0x01 ‖ op[1] ‖ plen[u32] ‖ payload[plen]`. The receiver MUST reject
//! `plen > 65535` as malformed; the sender MUST enforce the same cap.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::VERSION;
use crate::{
    proto::error::{PayloadTooLargeSnafu, ProtoError, UnknownApduOpSnafu},
    types::ApduOp,
};

/// Maximum payload length accepted on either side of the wire.
pub const MAX_PAYLOAD_LEN: u32 = 65_535;

const HEADER_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduPacket {
    pub op: ApduOp,
    pub payload: Bytes,
}

impl ApduPacket {
    pub fn new(op: ApduOp, payload: Bytes) -> Result<Self, ProtoError> {
        if payload.len() as u64 > MAX_PAYLOAD_LEN as u64 {
            return PayloadTooLargeSnafu {
                plen: payload.len() as u32,
            }
            .fail();
        }
        Ok(Self { op, payload })
    }

    pub fn apdu(payload: Bytes) -> Result<Self, ProtoError> {
        Self::new(ApduOp::Apdu, payload)
    }

    pub fn reset() -> Self {
        Self {
            op: ApduOp::Reset,
            payload: Bytes::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApduPacketCodec;

impl Decoder for ApduPacketCodec {
    type Error = ProtoError;
    type Item = ApduPacket;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let plen = u32::from_be_bytes(src[2..6].try_into().expect("4 bytes"));
        if plen > MAX_PAYLOAD_LEN {
            return PayloadTooLargeSnafu { plen }.fail();
        }
        let total_len = HEADER_LEN + plen as usize;
        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        let mut buf = src.split_to(total_len);
        super::expect_version(buf.get_u8())?;
        let op_byte = buf.get_u8();
        let op = match ApduOp::from(op_byte) {
            ApduOp::Other(value) => return UnknownApduOpSnafu { value }.fail(),
            op => op,
        };
        let _plen = buf.get_u32();
        let payload = buf.freeze();

        Ok(Some(ApduPacket { op, payload }))
    }
}

impl Encoder<ApduPacket> for ApduPacketCodec {
    type Error = ProtoError;

    fn encode(&mut self, item: ApduPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() as u64 > MAX_PAYLOAD_LEN as u64 {
            return PayloadTooLargeSnafu {
                plen: item.payload.len() as u32,
            }
            .fail();
        }
        dst.reserve(HEADER_LEN + item.payload.len());
        dst.put_u8(VERSION);
        dst.put_u8(item.op.into());
        dst.put_u32(item.payload.len() as u32);
        dst.put_slice(&item.payload);
        Ok(())
    }
}
