//! Response emission for one request cycle.
//!
//! # Responsibilities
//! - Send the status line and headers at most once
//! - Send body data as SEND_BODY_CHUNK packets
//! - Send END_RESPONSE at most once and flush
//!
//! # Design Decisions
//! - The one-shot flags live in the cycle, not the emitter, so a second
//!   emitter for the same cycle still honors them
//! - Writing body before headers commits a default `200 OK`

use std::io;

use http::{HeaderMap, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::protocol::codes::MAX_SEND_BODY_CHUNK;
use crate::protocol::response;
use crate::protocol::Framer;
use crate::session::state::Cycle;

/// Writes AJP13 response packets for the current cycle.
pub struct ResponseEmitter<'a, S> {
    framer: &'a mut Framer<S>,
    cycle: &'a mut Cycle,
}

impl<'a, S: AsyncRead + AsyncWrite + Unpin> ResponseEmitter<'a, S> {
    pub fn new(framer: &'a mut Framer<S>, cycle: &'a mut Cycle) -> Self {
        Self { framer, cycle }
    }

    /// Send status and headers. No-op if headers were already sent.
    pub async fn write_headers(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        if self.cycle.headers_sent() {
            tracing::trace!(status = %status, "Headers already sent, ignoring");
            return Ok(());
        }
        let payload = response::send_headers(status, headers)?;
        self.cycle.try_mark_headers_sent();
        self.cycle.set_status(status.as_u16());
        self.framer.write_frame(&payload).await
    }

    /// Send one body chunk of at most [`MAX_SEND_BODY_CHUNK`] bytes.
    pub async fn write_body_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.cycle.end_sent() {
            return Err(io::Error::other("response already ended"));
        }
        let payload = response::send_body_chunk(chunk)?;
        if !self.cycle.headers_sent() {
            self.write_headers(StatusCode::OK, &HeaderMap::new()).await?;
        }
        if chunk.is_empty() {
            return Ok(());
        }
        self.framer.write_frame(&payload).await
    }

    /// Send a body of any size, split into maximal chunks.
    pub async fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        for chunk in body.chunks(MAX_SEND_BODY_CHUNK) {
            self.write_body_chunk(chunk).await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.framer.flush().await
    }

    /// Finish the response and flush. No-op if already finished.
    pub async fn end_response(&mut self) -> io::Result<()> {
        self.end_response_with(true).await
    }

    /// Like [`ResponseEmitter::end_response`], telling the web server
    /// whether it may reuse the connection.
    pub async fn end_response_with(&mut self, reuse: bool) -> io::Result<()> {
        if self.cycle.end_sent() {
            return Ok(());
        }
        if !self.cycle.headers_sent() {
            self.write_headers(StatusCode::OK, &HeaderMap::new()).await?;
        }
        self.cycle.try_mark_end_sent();
        self.framer.write_frame(&response::end_response(reuse)).await?;
        self.framer.flush().await
    }

    pub fn headers_sent(&self) -> bool {
        self.cycle.headers_sent()
    }

    pub fn end_sent(&self) -> bool {
        self.cycle.end_sent()
    }
}
