//! One request/response exchange as seen by a [`RequestHandler`].
//!
//! [`RequestHandler`]: crate::handler::RequestHandler

use std::error::Error as StdError;
use std::io;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::protocol::{DecodeError, ForwardRequest, FrameError, Framer};
use crate::session::body::BodyReader;
use crate::session::emitter::ResponseEmitter;
use crate::session::state::{BodyOverflow, Cycle};

/// Errors raised while serving a request.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    BodyOverflow(#[from] BodyOverflow),

    #[error("unexpected {0} packet inside a request cycle")]
    UnexpectedPacket(&'static str),

    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("handler failed: {0}")]
    Handler(#[source] Box<dyn StdError + Send + Sync>),
}

impl ExchangeError {
    /// Wrap an application error.
    pub fn handler(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        ExchangeError::Handler(err.into())
    }

    /// Whether the connection can no longer carry packets.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ExchangeError::Handler(_) | ExchangeError::BodyTooLarge(_))
    }
}

/// The request being served plus the means to read its body and respond.
pub struct Exchange<'a, S> {
    framer: &'a mut Framer<S>,
    cycle: &'a mut Cycle,
    packages: &'a mut u32,
    request: ForwardRequest,
    pending: Option<Bytes>,
}

impl<'a, S: AsyncRead + AsyncWrite + Unpin> Exchange<'a, S> {
    pub(crate) fn new(
        framer: &'a mut Framer<S>,
        cycle: &'a mut Cycle,
        packages: &'a mut u32,
        request: ForwardRequest,
        pending: Option<Bytes>,
    ) -> Self {
        Self {
            framer,
            cycle,
            packages,
            request,
            pending,
        }
    }

    pub fn request(&self) -> &ForwardRequest {
        &self.request
    }

    pub fn cycle(&self) -> &Cycle {
        &*self.cycle
    }

    /// Override the servlet path derived from the request attributes.
    pub fn set_servlet_path(&mut self, path: impl Into<String>) {
        self.cycle.set_servlet_path(Some(path.into()));
    }

    /// Packets read on this connection so far.
    pub fn package_number(&self) -> u32 {
        *self.packages
    }

    pub fn body(&mut self) -> BodyReader<'_, S> {
        BodyReader::new(self.framer, self.cycle, self.packages, &mut self.pending)
    }

    pub fn response(&mut self) -> ResponseEmitter<'_, S> {
        ResponseEmitter::new(self.framer, self.cycle)
    }

    /// Read the whole request body, up to `limit` bytes.
    pub async fn read_body(&mut self, limit: usize) -> Result<Bytes, ExchangeError> {
        self.body().read_to_end(limit).await
    }

    pub async fn write_headers(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        self.response().write_headers(status, headers).await
    }

    pub async fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        self.response().write_body(body).await
    }

    pub async fn end_response(&mut self) -> io::Result<()> {
        self.response().end_response().await
    }

    pub fn headers_sent(&self) -> bool {
        self.cycle.headers_sent()
    }

    pub fn end_sent(&self) -> bool {
        self.cycle.end_sent()
    }
}
