//! `AuthRequest`/`AuthResponse` records.
//!
//! `AuthRequest`: `0x01 ‖ session_token[25]` (26 bytes total).
//! `AuthResponse`: `0x01 ‖ status[1]` (2 bytes total).

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::VERSION;
use crate::{
    proto::error::ProtoError,
    types::{AuthStatus, SessionToken, TOKEN_LEN},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRequest {
    pub session_token: SessionToken,
}

impl AuthRequest {
    pub const LEN: usize = 1 + TOKEN_LEN;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthRequestCodec;

impl Decoder for AuthRequestCodec {
    type Error = ProtoError;
    type Item = AuthRequest;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < AuthRequest::LEN {
            return Ok(None);
        }
        let mut buf = src.split_to(AuthRequest::LEN);
        super::expect_version(buf.get_u8())?;
        let mut token = [0u8; TOKEN_LEN];
        buf.copy_to_slice(&mut token);
        Ok(Some(AuthRequest {
            session_token: SessionToken::from_bytes(token),
        }))
    }
}

impl Encoder<AuthRequest> for AuthRequestCodec {
    type Error = ProtoError;

    fn encode(&mut self, item: AuthRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(AuthRequest::LEN);
        dst.put_u8(VERSION);
        dst.put_slice(item.session_token.as_bytes());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResponse {
    pub status: AuthStatus,
}

impl AuthResponse {
    pub const LEN: usize = 2;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthResponseCodec;

impl Decoder for AuthResponseCodec {
    type Error = ProtoError;
    type Item = AuthResponse;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < AuthResponse::LEN {
            return Ok(None);
        }
        let mut buf = src.split_to(AuthResponse::LEN);
        super::expect_version(buf.get_u8())?;
        let status = AuthStatus::from(buf.get_u8());
        Ok(Some(AuthResponse { status }))
    }
}

impl Encoder<AuthResponse> for AuthResponseCodec {
    type Error = ProtoError;

    fn encode(&mut self, item: AuthResponse, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(AuthResponse::LEN);
        dst.put_u8(VERSION);
        dst.put_u8(item.status.into());
        Ok(())
    }
}
