//! Request body retrieval.
//!
//! The web server sends the first body packet on its own right after the
//! Forward Request when the length is known. Every later packet must be
//! asked for with GET_BODY_CHUNK; nothing here polls the stream unasked.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::observability::metrics;
use crate::protocol::codes::MAX_READ_BODY_CHUNK;
use crate::protocol::packet::body_data;
use crate::protocol::{decode, response, Framer, RequestKind};
use crate::session::exchange::ExchangeError;
use crate::session::state::Cycle;

/// Read one body packet (no timeout) and account for it in `cycle`.
///
/// Returns the data carried; empty data marks the end of the body.
pub(crate) async fn receive_body_packet<S>(
    framer: &mut Framer<S>,
    cycle: &mut Cycle,
    packages: &mut u32,
) -> Result<Bytes, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let packet = framer.read_packet(None).await?;
    *packages = packages.wrapping_add(1);

    let payload = match decode(packet, false)? {
        RequestKind::RequestBody(payload) => payload,
        other => return Err(ExchangeError::UnexpectedPacket(other.name())),
    };
    metrics::record_packet("request_body");

    let data = body_data(&payload);
    if data.is_empty() {
        cycle.mark_body_exhausted();
    } else {
        cycle.record_body(data.len() as u64)?;
    }
    tracing::trace!(
        package = *packages,
        bytes = data.len(),
        total = cycle.total_requested(),
        "Body packet received"
    );
    Ok(data)
}

/// Pulls request body chunks for the current cycle.
pub struct BodyReader<'a, S> {
    framer: &'a mut Framer<S>,
    cycle: &'a mut Cycle,
    packages: &'a mut u32,
    pending: &'a mut Option<Bytes>,
}

impl<'a, S: AsyncRead + AsyncWrite + Unpin> BodyReader<'a, S> {
    pub(crate) fn new(
        framer: &'a mut Framer<S>,
        cycle: &'a mut Cycle,
        packages: &'a mut u32,
        pending: &'a mut Option<Bytes>,
    ) -> Self {
        Self {
            framer,
            cycle,
            packages,
            pending,
        }
    }

    /// Next chunk of body data, `None` once the body is complete.
    pub async fn read_chunk(&mut self) -> Result<Option<Bytes>, ExchangeError> {
        if let Some(chunk) = self.pending.take() {
            return Ok(Some(chunk));
        }
        if self.cycle.is_body_complete() {
            return Ok(None);
        }

        let requested = self
            .cycle
            .remaining()
            .map_or(MAX_READ_BODY_CHUNK, |left| {
                usize::try_from(left).unwrap_or(usize::MAX).min(MAX_READ_BODY_CHUNK)
            });
        self.framer
            .write_frame(&response::get_body_chunk(requested))
            .await?;
        self.framer.flush().await?;

        let data = receive_body_packet(self.framer, self.cycle, self.packages).await?;
        Ok((!data.is_empty()).then_some(data))
    }

    /// Collect the remaining body, failing once it exceeds `limit` bytes.
    pub async fn read_to_end(&mut self, limit: usize) -> Result<Bytes, ExchangeError> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.read_chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(ExchangeError::BodyTooLarge(limit));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    pub fn is_all_data_read(&self) -> bool {
        self.pending.is_none() && self.cycle.is_all_data_read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codes::{prefix, SERVER_MAGIC};
    use crate::protocol::framer::encode_frame;
    use crate::protocol::MagicCheck;
    use crate::session::state::ContentLength;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn body_frame(data: &[u8]) -> Vec<u8> {
        let mut payload = (data.len() as u16).to_be_bytes().to_vec();
        payload.extend_from_slice(data);
        encode_frame(SERVER_MAGIC, &payload).unwrap().to_vec()
    }

    #[tokio::test]
    async fn zero_length_reads_nothing() {
        let (_client, server) = duplex(1024);
        let mut framer = Framer::new(server, MagicCheck::Strict);
        let mut cycle = Cycle::default();
        cycle.set_content_length(ContentLength::Zero);
        let (mut packages, mut pending) = (0, None);

        let mut reader = BodyReader::new(&mut framer, &mut cycle, &mut packages, &mut pending);
        assert!(reader.is_all_data_read());
        assert_eq!(reader.read_chunk().await.unwrap(), None);
        assert_eq!(packages, 0);
    }

    #[tokio::test]
    async fn known_length_requests_remaining_chunks() {
        let (mut client, server) = duplex(64 * 1024);
        let mut framer = Framer::new(server, MagicCheck::Strict);
        let mut cycle = Cycle::default();
        cycle.set_content_length(ContentLength::Known(10));
        let mut packages = 1;

        client.write_all(&body_frame(b"hello")).await.unwrap();
        let first = receive_body_packet(&mut framer, &mut cycle, &mut packages)
            .await
            .unwrap();
        assert_eq!(&first[..], b"hello");
        assert_eq!(cycle.total_requested(), 5);

        client.write_all(&body_frame(b"world")).await.unwrap();
        let mut pending = Some(first);
        let body = {
            let mut reader = BodyReader::new(&mut framer, &mut cycle, &mut packages, &mut pending);
            let body = reader.read_to_end(1024).await.unwrap();
            assert!(reader.is_all_data_read());
            body
        };
        assert_eq!(&body[..], b"helloworld");
        assert_eq!(packages, 3);

        // exactly one GET_BODY_CHUNK for the 5 missing bytes
        drop(framer);
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![0x41, 0x42, 0x00, 0x03, prefix::GET_BODY_CHUNK, 0x00, 0x05]);
    }

    #[tokio::test]
    async fn unset_length_stops_at_empty_packet() {
        let (mut client, server) = duplex(64 * 1024);
        let mut framer = Framer::new(server, MagicCheck::Strict);
        let mut cycle = Cycle::default();
        cycle.set_chunked(true);
        let (mut packages, mut pending) = (1, None);

        client.write_all(&body_frame(b"abc")).await.unwrap();
        client.write_all(&encode_frame(SERVER_MAGIC, &[]).unwrap()).await.unwrap();

        let mut reader = BodyReader::new(&mut framer, &mut cycle, &mut packages, &mut pending);
        assert_eq!(reader.read_to_end(1024).await.unwrap(), Bytes::from_static(b"abc"));
        assert!(!reader.is_all_data_read());
        assert_eq!(reader.read_chunk().await.unwrap(), None);
        assert!(cycle.is_body_exhausted());
        assert_eq!(cycle.total_requested(), 3);
    }

    #[tokio::test]
    async fn unset_length_without_chunking_requests_nothing() {
        let (mut client, server) = duplex(1024);
        let mut framer = Framer::new(server, MagicCheck::Strict);
        let mut cycle = Cycle::default();
        let (mut packages, mut pending) = (1, None);

        let mut reader = BodyReader::new(&mut framer, &mut cycle, &mut packages, &mut pending);
        assert!(reader.read_to_end(1024).await.unwrap().is_empty());
        assert_eq!(packages, 1);

        drop(framer);
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn overflow_and_limit_are_errors() {
        let (mut client, server) = duplex(64 * 1024);
        let mut framer = Framer::new(server, MagicCheck::Strict);
        let mut cycle = Cycle::default();
        cycle.set_content_length(ContentLength::Known(2));
        let mut packages = 0;

        client.write_all(&body_frame(b"toolong")).await.unwrap();
        let err = receive_body_packet(&mut framer, &mut cycle, &mut packages)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::BodyOverflow(_)));

        let mut cycle = Cycle::default();
        let mut pending = Some(Bytes::from_static(b"0123456789"));
        let mut reader = BodyReader::new(&mut framer, &mut cycle, &mut packages, &mut pending);
        assert!(matches!(
            reader.read_to_end(4).await,
            Err(ExchangeError::BodyTooLarge(4))
        ));
    }
}
