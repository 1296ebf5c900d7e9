//! Packet framing over a byte stream.
//!
//! # Responsibilities
//! - Read `magic | length | payload` frames sent by the web server
//! - Enforce the magic-byte policy (strict or lenient)
//! - Write `"AB" | length | payload` frames back to the web server
//!
//! # Design Decisions
//! - Idle timeout is an explicit per-call parameter and only bounds the wait
//!   for the magic bytes; a request in flight is never timed out here
//! - A short payload is zero-padded and flagged instead of failing the read
//! - On a bad magic the immediately readable bytes are drained for a dump

use std::io;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};

use crate::observability::metrics;
use crate::protocol::codes::{CONTAINER_MAGIC, HEADER_LEN, SERVER_MAGIC};
use crate::protocol::error::FrameError;
use crate::protocol::packet::Packet;

/// Upper bound on bytes collected for an invalid-sequence dump.
const MAX_DUMP_LEN: usize = 8192;

/// How strictly the two magic bytes are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MagicCheck {
    /// Both bytes must equal `0x12 0x34`.
    #[default]
    Strict,
    /// Either byte matching is enough.
    Lenient,
}

impl MagicCheck {
    /// Whether `magic` passes this policy.
    pub fn accepts(self, magic: [u8; 2]) -> bool {
        match self {
            MagicCheck::Strict => magic == SERVER_MAGIC,
            MagicCheck::Lenient => magic[0] == SERVER_MAGIC[0] || magic[1] == SERVER_MAGIC[1],
        }
    }
}

/// Encode one frame: magic, big-endian length, payload.
pub fn encode_frame(magic: [u8; 2], payload: &[u8]) -> io::Result<Bytes> {
    let length = u16::try_from(payload.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("payload of {} bytes exceeds AJP13 frame limit", payload.len()),
        )
    })?;
    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_slice(&magic);
    frame.put_u16(length);
    frame.put_slice(payload);
    Ok(frame.freeze())
}

/// Reads and writes AJP13 frames on one connection.
#[derive(Debug)]
pub struct Framer<S> {
    stream: BufStream<S>,
    magic_check: MagicCheck,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Framer<S> {
    /// Wrap a stream with the given magic-byte policy.
    pub fn new(stream: S, magic_check: MagicCheck) -> Self {
        Self {
            stream: BufStream::new(stream),
            magic_check,
        }
    }

    /// Read the next packet.
    ///
    /// `timeout` bounds only the wait for the magic bytes.
    pub async fn read_packet(&mut self, timeout: Option<Duration>) -> Result<Packet, FrameError> {
        let magic = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_magic())
                .await
                .map_err(|_| FrameError::IdleTimeout(limit))??,
            None => self.read_magic().await?,
        };

        if !self.magic_check.accepts(magic) {
            let mut dump = magic.to_vec();
            self.drain_available(&mut dump);
            metrics::record_invalid_sequence();
            return Err(FrameError::InvalidSequence { magic, dump });
        }

        let length = match self.stream.read_u16().await {
            Ok(length) => length,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(FrameError::StreamClosed)
            }
            Err(e) => return Err(e.into()),
        };

        let mut payload = BytesMut::zeroed(usize::from(length));
        let received = self.read_full(&mut payload).await?;
        let truncated = received < payload.len();
        if truncated {
            tracing::warn!(
                declared = length,
                received,
                "Peer closed mid-packet, zero-padding payload"
            );
            metrics::record_truncated_payload();
        }

        Ok(Packet {
            magic,
            length,
            payload: payload.freeze(),
            truncated,
        })
    }

    /// Write one container frame. Buffered until [`Framer::flush`].
    pub async fn write_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        let frame = encode_frame(CONTAINER_MAGIC, payload)?;
        self.stream.write_all(&frame).await
    }

    /// Write pre-encoded bytes as-is.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().await
    }

    async fn read_magic(&mut self) -> Result<[u8; 2], FrameError> {
        let mut magic = [0u8; 2];
        for byte in magic.iter_mut() {
            *byte = match self.stream.read_u8().await {
                Ok(b) => b,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(FrameError::StreamClosed)
                }
                Err(e) => return Err(e.into()),
            };
        }
        Ok(magic)
    }

    /// Fill `buf` until full or EOF; returns the number of bytes read.
    async fn read_full(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.stream.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Append whatever can be read without waiting.
    fn drain_available(&mut self, dump: &mut Vec<u8>) {
        let mut chunk = [0u8; 1024];
        while dump.len() < MAX_DUMP_LEN {
            match self.stream.read(&mut chunk).now_or_never() {
                Some(Ok(n)) if n > 0 => dump.extend_from_slice(&chunk[..n]),
                _ => break,
            }
        }
    }
}
