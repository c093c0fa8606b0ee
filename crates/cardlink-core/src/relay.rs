//! Bidirectional APDU relay (C6).
//!
//! Once a provider and a probe are paired, the broker copies
//! `ApduPacket` records transparently between them until either side
//! closes or sends a malformed frame. Relaying is symmetric: the relay
//! does not interpret `op` or `payload`, it only re-frames them.
//!
//! Each direction is split into its own read half and write half so a
//! stalled write on one side never stops the other side's reads from
//! being polled: the two directions are independent futures raced by a
//! single `tokio::select!`, torn down together on first error.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio_util::sync::CancellationToken;

use crate::{
    proto::{ApduPacketCodec, apdu::ApduPacket},
    stream::{FramedStream, RecordError},
};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("provider side: {0}")]
    Provider(#[source] RecordError<crate::proto::error::ProtoError>),
    #[error("probe side: {0}")]
    Probe(#[source] RecordError<crate::proto::error::ProtoError>),
}

/// Outcome of a completed relay: which side closed first, if known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    ProviderClosed,
    ProbeClosed,
    Cancelled,
}

/// Runs the relay until one side closes, errors, or `cancel` fires.
/// Takes both streams by value since each is split into independent
/// read/write halves for the duration of the relay.
pub async fn relay<P, Q>(
    provider: FramedStream<P>,
    probe: FramedStream<Q>,
    cancel: &CancellationToken,
) -> Result<RelayEnd, RelayError>
where
    P: AsyncRead + AsyncWrite + Unpin + Send,
    Q: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (mut provider_read, mut probe_write) = provider.split();
    let (mut probe_read, mut provider_write) = probe.split();

    let mut provider_codec = ApduPacketCodec;
    let mut probe_codec = ApduPacketCodec;

    let provider_to_probe = async {
        loop {
            match provider_read
                .read_record(&mut provider_codec)
                .await
                .map_err(RelayError::Provider)?
            {
                Some(packet) => forward(&mut probe_write, packet).await.map_err(RelayError::Probe)?,
                None => return Ok(RelayEnd::ProviderClosed),
            }
        }
    };

    let probe_to_provider = async {
        loop {
            match probe_read
                .read_record(&mut probe_codec)
                .await
                .map_err(RelayError::Probe)?
            {
                Some(packet) => forward(&mut provider_write, packet).await.map_err(RelayError::Provider)?,
                None => return Ok(RelayEnd::ProbeClosed),
            }
        }
    };

    tokio::select! {
        biased;

        _ = cancel.cancelled() => Ok(RelayEnd::Cancelled),
        result = provider_to_probe => result,
        result = probe_to_provider => result,
    }
}

async fn forward<T>(
    dst: &mut WriteHalf<T>,
    packet: ApduPacket,
) -> Result<(), RecordError<crate::proto::error::ProtoError>>
where
    T: AsyncWrite + Unpin,
{
    use tokio_util::codec::Encoder;
    let mut buf = bytes::BytesMut::new();
    ApduPacketCodec
        .encode(packet, &mut buf)
        .map_err(RecordError::Decode)?;
    dst.write_all(&buf).await.map_err(RecordError::Io)?;
    Ok(())
}
