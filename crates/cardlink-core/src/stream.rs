//! Framed stream (C2): a buffered byte-oriented reader with
//! `read_exactly` and decoder-driven partial-frame completion.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Decoder;

/// Chunk size used to top up the receive buffer from the socket.
const FILL_CHUNK: usize = 1024;

/// Wraps any async byte transport and maintains the single receive
/// buffer used to decode records as they arrive.
pub struct FramedStream<T> {
    inner: T,
    buf: BytesMut,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("peer closed the connection")]
    Eof,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl<T> FramedStream<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> FramedStream<T>
where
    T: AsyncRead + Unpin + Send,
{
    /// Reads until exactly `n` bytes have been delivered, blocking
    /// (suspending) until satisfied. Returns [`StreamError::Eof`] if the
    /// peer closes before `n` bytes arrive.
    pub async fn read_exactly(&mut self, n: usize) -> Result<BytesMut, StreamError> {
        while self.buf.len() < n {
            if !self.fill_once().await? {
                return Err(StreamError::Eof);
            }
        }
        Ok(self.buf.split_to(n))
    }

    /// Returns up to `n` bytes; an empty result means the peer closed
    /// and no buffered bytes remain.
    pub async fn read(&mut self, n: usize) -> Result<BytesMut, std::io::Error> {
        if self.buf.is_empty() {
            self.fill_once().await?;
        }
        let take = n.min(self.buf.len());
        Ok(self.buf.split_to(take))
    }

    /// Drives `decoder` to completion by repeatedly topping up the
    /// internal buffer (in [`FILL_CHUNK`]-sized reads) until it reports a
    /// complete record. Returns `Ok(None)` on a clean EOF with no
    /// partial record buffered; an EOF mid-record is a [`StreamError`].
    pub async fn read_record<D>(&mut self, decoder: &mut D) -> Result<Option<D::Item>, RecordError<D::Error>>
    where
        D: Decoder,
    {
        loop {
            if let Some(item) = decoder.decode(&mut self.buf).map_err(RecordError::Decode)? {
                return Ok(Some(item));
            }
            let had_buffered = !self.buf.is_empty();
            if !self.fill_once().await.map_err(RecordError::Io)? {
                if had_buffered {
                    return Err(RecordError::Io(std::io::Error::from(
                        std::io::ErrorKind::UnexpectedEof,
                    )));
                }
                return Ok(None);
            }
        }
    }

    /// Reads one chunk from the socket into the buffer. Returns `false`
    /// on EOF.
    async fn fill_once(&mut self) -> Result<bool, std::io::Error> {
        let start = self.buf.len();
        self.buf.resize(start + FILL_CHUNK, 0);
        let n = self.inner.read(&mut self.buf[start..]).await?;
        self.buf.truncate(start + n);
        Ok(n != 0)
    }
}

impl<T> FramedStream<T>
where
    T: AsyncWrite + Unpin + Send,
{
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), std::io::Error> {
        self.inner.write_all(bytes).await
    }

    pub async fn close(&mut self) -> Result<(), std::io::Error> {
        self.inner.shutdown().await
    }
}

impl<T> FramedStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Splits a duplex stream into an independent read half (keeping any
    /// already-buffered partial-frame bytes) and write half, so a
    /// relay's two directions can make progress without one's pending
    /// write stalling the other's read.
    pub fn split(self) -> (FramedStream<tokio::io::ReadHalf<T>>, tokio::io::WriteHalf<T>) {
        let (read_half, write_half) = tokio::io::split(self.inner);
        (
            FramedStream {
                inner: read_half,
                buf: self.buf,
            },
            write_half,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError<E> {
    #[error("transport error")]
    Io(#[from] std::io::Error),
    #[error("decode error")]
    Decode(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{ApduPacketCodec, apdu::ApduPacket};
    use bytes::Bytes;
    use tokio::io::duplex;

    #[tokio::test]
    async fn read_exactly_accumulates_partial_socket_reads() {
        let (mut client, server) = duplex(4096);
        let mut stream = FramedStream::new(server);

        let write_task = tokio::spawn(async move {
            client.write_all(b"ab").await.unwrap();
            tokio::task::yield_now().await;
            client.write_all(b"cde").await.unwrap();
            client
        });

        let got = stream.read_exactly(5).await.unwrap();
        assert_eq!(&got[..], b"abcde");
        write_task.await.unwrap();
    }

    #[tokio::test]
    async fn read_exactly_reports_eof_on_short_close() {
        let (mut client, server) = duplex(4096);
        let mut stream = FramedStream::new(server);
        tokio::spawn(async move {
            client.write_all(b"ab").await.unwrap();
            drop(client);
        });
        let result = stream.read_exactly(5).await;
        assert!(matches!(result, Err(StreamError::Eof)));
    }

    /// Property 3: for any split of an encoded record into
    /// arbitrary chunks, `read_record` yields exactly the original
    /// record.
    #[tokio::test]
    async fn read_record_completes_arbitrarily_chunked_frames() {
        let packet = ApduPacket::apdu(Bytes::from_static(b"hello world")).unwrap();
        let mut encoded = BytesMut::new();
        {
            use tokio_util::codec::Encoder;
            ApduPacketCodec.encode(packet.clone(), &mut encoded).unwrap();
        }
        let encoded = encoded.freeze();

        for chunk_size in 1..=encoded.len() {
            let (mut client, server) = duplex(4096);
            let mut stream = FramedStream::new(server);
            let bytes = encoded.clone();
            let writer = tokio::spawn(async move {
                for chunk in bytes.chunks(chunk_size) {
                    client.write_all(chunk).await.unwrap();
                    tokio::task::yield_now().await;
                }
            });
            let mut codec = ApduPacketCodec;
            let got = stream.read_record(&mut codec).await.unwrap().unwrap();
            assert_eq!(got, packet);
            writer.await.unwrap();
        }
    }

    #[tokio::test]
    async fn read_record_returns_none_on_clean_eof_between_records() {
        let (client, server) = duplex(4096);
        let mut stream = FramedStream::new(server);
        drop(client);
        let mut codec = ApduPacketCodec;
        let got = stream.read_record(&mut codec).await.unwrap();
        assert!(got.is_none());
    }
}
