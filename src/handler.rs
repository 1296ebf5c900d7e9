//! Request processing seam.
//!
//! The connector frames and parses requests; everything past that point
//! belongs to a [`RequestHandler`].

use std::future::Future;
use std::time::Duration;

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::session::{Exchange, ExchangeError};

/// Byte stream a connection can run over.
pub trait AjpStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AjpStream for T {}

/// Executes a forwarded request.
///
/// The worker calls `end_response` after `handle` returns, so a handler may
/// leave the response open. Returning an error before any headers were
/// written produces a `500`.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle<S: AjpStream>(
        &self,
        exchange: &mut Exchange<'_, S>,
    ) -> impl Future<Output = Result<(), ExchangeError>> + Send;
}

/// Default cap on how much request body the echo handler buffers.
const ECHO_BODY_LIMIT: usize = 1024 * 1024;

/// Answers every request with a plain-text summary of what was received.
#[derive(Debug, Clone)]
pub struct EchoHandler {
    body_limit: usize,
    delay: Option<Duration>,
}

impl EchoHandler {
    /// Create a new echo handler.
    pub fn new() -> Self {
        Self {
            body_limit: ECHO_BODY_LIMIT,
            delay: None,
        }
    }

    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    /// Sleep before answering. Used to simulate slow or stuck processing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Default for EchoHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestHandler for EchoHandler {
    async fn handle<S: AjpStream>(&self, exchange: &mut Exchange<'_, S>) -> Result<(), ExchangeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let body = exchange.read_body(self.body_limit).await?;

        let request = exchange.request();
        let mut summary = format!("{} {}\n", request.request_line(), request.protocol);
        for (name, value) in &request.headers {
            summary.push_str(&format!(
                "{}: {}\n",
                name,
                String::from_utf8_lossy(value.as_bytes())
            ));
        }
        if let Some(session) = exchange.cycle().http_session_id() {
            summary.push_str(&format!("session: {session}\n"));
        }
        if let Some(path) = exchange.cycle().servlet_path() {
            summary.push_str(&format!("servlet-path: {path}\n"));
        }
        summary.push('\n');

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));

        exchange.write_headers(StatusCode::OK, &headers).await?;
        exchange.write_body(summary.as_bytes()).await?;
        exchange.write_body(&body).await?;
        Ok(())
    }
}
