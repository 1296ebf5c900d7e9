//! Per-connection request loop.
//!
//! # Responsibilities
//! - Read packets strictly in order and drive the cycle state machine
//! - Answer CPing, skip unsupported packets, dispatch Forward Requests
//! - Keep the watchdog entry's activity current
//! - Drop the connection promptly when its stop signal fires
//!
//! # Data Flow
//! ```text
//! Waiting ─read_packet─▶ decode
//!   ├─ CPing           → CPong, reset
//!   ├─ Unsupported     → log, reset
//!   └─ ForwardRequest  → parse → Processing → pre-read body (Known)
//!                        → handler → 500 on early failure → end_response
//!                        → reset
//! ```

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::config::AjpConfig;
use crate::handler::{AjpStream, RequestHandler};
use crate::observability::metrics;
use crate::protocol::codes::{hex_dump, CPONG};
use crate::protocol::{decode, ForwardRequest, FrameError, Framer, RequestKind, Unsupported};
use crate::session::body::receive_body_packet;
use crate::session::exchange::{Exchange, ExchangeError};
use crate::session::state::{ConnectionState, ContentLength};
use crate::watchdog::{Registration, WatchdogEntry};

/// Serves AJP13 connections with a shared handler.
pub struct Worker<H> {
    handler: Arc<H>,
    ajp: AjpConfig,
}

impl<H> Clone for Worker<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            ajp: self.ajp.clone(),
        }
    }
}

impl<H: RequestHandler> Worker<H> {
    /// Create a new worker.
    pub fn new(handler: Arc<H>, ajp: AjpConfig) -> Self {
        Self { handler, ajp }
    }

    /// Serve one connection until it closes, fails, or is stopped.
    ///
    /// The registration is released when this returns.
    pub async fn serve<S: AjpStream>(&self, stream: S, registration: Registration) {
        let entry = Arc::clone(registration.entry());
        let mut framer = Framer::new(stream, self.ajp.magic_check);
        let mut state = ConnectionState::new();

        tracing::debug!(
            connection_id = %entry.id(),
            peer_addr = %entry.peer(),
            "Connection started"
        );

        let result = tokio::select! {
            result = self.run(&mut framer, &mut state, &entry) => result,
            _ = entry.stopped() => {
                tracing::debug!(connection_id = %entry.id(), "Connection stopped for restart");
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!(
                connection_id = %entry.id(),
                peer_addr = %entry.peer(),
                package = state.package_number(),
                error = %e,
                "Connection dropped"
            );
        }
        tracing::debug!(
            connection_id = %entry.id(),
            packages = state.package_number(),
            "Connection closed"
        );
        drop(registration);
    }

    async fn run<S>(
        &self,
        framer: &mut Framer<S>,
        state: &mut ConnectionState,
        entry: &WatchdogEntry,
    ) -> Result<(), ExchangeError>
    where
        S: AjpStream,
    {
        let mut first_packet = true;

        loop {
            entry.begin_waiting();
            let timeout = if first_packet {
                self.ajp.idle_read_timeout()
            } else {
                None
            };

            let packet = match framer.read_packet(timeout).await {
                Ok(packet) => packet,
                Err(FrameError::StreamClosed) => {
                    tracing::debug!(connection_id = %entry.id(), "Peer closed connection");
                    return Ok(());
                }
                Err(FrameError::IdleTimeout(limit)) => {
                    tracing::debug!(
                        connection_id = %entry.id(),
                        timeout_ms = limit.as_millis() as u64,
                        "No request before idle timeout"
                    );
                    return Ok(());
                }
                Err(FrameError::InvalidSequence { magic, dump }) => {
                    tracing::warn!(
                        connection_id = %entry.id(),
                        peer_addr = %entry.peer(),
                        magic = %hex_dump(&magic),
                        dump = %hex_dump(&dump),
                        "Invalid AJP13 magic, dropping connection"
                    );
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            first_packet = false;

            let package = state.next_package();
            let kind = decode(packet, state.is_idle())?;
            metrics::record_packet(kind.name());
            tracing::trace!(connection_id = %entry.id(), package, kind = kind.name(), "Packet received");

            match kind {
                RequestKind::CPing(_) => {
                    state.begin_cycle();
                    framer.write_raw(&CPONG).await?;
                    framer.flush().await?;
                    state.reset();
                }
                RequestKind::Unsupported(unsupported) => {
                    state.begin_cycle();
                    log_unsupported(entry, &unsupported);
                    state.reset();
                }
                RequestKind::ForwardRequest(payload) => {
                    self.serve_request(framer, state, entry, payload).await?;
                    state.reset();
                }
                RequestKind::RequestBody(_) => {
                    return Err(ExchangeError::UnexpectedPacket("request_body"));
                }
            }
        }
    }

    async fn serve_request<S>(
        &self,
        framer: &mut Framer<S>,
        state: &mut ConnectionState,
        entry: &WatchdogEntry,
        payload: Bytes,
    ) -> Result<(), ExchangeError>
    where
        S: AjpStream,
    {
        let request = ForwardRequest::parse(payload)?;
        let content_length = ContentLength::from_declared(request.declared_content_length()?);
        let method = request.method.clone();
        let request_line = request.request_line();
        let started = Instant::now();

        let (cycle, packages) = state.assign();
        cycle.set_content_length(content_length);
        cycle.set_chunked(request.is_chunked());
        cycle.set_form_data(request.is_form_data());
        cycle.set_http_session_id(request.http_session_id());
        cycle.set_servlet_path(request.servlet_path.clone());
        entry.begin_processing(request_line.as_str());

        tracing::debug!(
            connection_id = %entry.id(),
            request = %request_line,
            content_length = ?content_length,
            "Forward request"
        );

        let mut pending = None;
        if let ContentLength::Known(_) = content_length {
            let data = receive_body_packet(framer, cycle, packages).await?;
            if !data.is_empty() {
                pending = Some(data);
            }
        }

        let mut exchange = Exchange::new(framer, cycle, packages, request, pending);
        let outcome = self.handler.handle(&mut exchange).await;
        let outcome_failed = outcome.is_err();

        let fatal = match outcome {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    connection_id = %entry.id(),
                    request = %request_line,
                    headers_sent = exchange.headers_sent(),
                    error = %e,
                    "Request handler failed"
                );
                e.is_fatal().then_some(e)
            }
        };

        // a connection about to be dropped is not offered for reuse
        let ended = finish_response(&mut exchange, outcome_failed, fatal.is_none()).await;
        drop(exchange);
        match (ended, &fatal) {
            (Err(e), None) => return Err(e.into()),
            (Err(e), Some(_)) => tracing::debug!(
                connection_id = %entry.id(),
                error = %e,
                "Could not end response on failing connection"
            ),
            (Ok(()), _) => {}
        }

        let status = cycle.status().unwrap_or(StatusCode::OK.as_u16());
        metrics::record_request(method.as_str(), status, started);
        tracing::debug!(
            connection_id = %entry.id(),
            request = %request_line,
            status,
            body_bytes = cycle.total_requested(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Commit a 500 if a failed handler sent no headers, then end the response.
async fn finish_response<S: AjpStream>(
    exchange: &mut Exchange<'_, S>,
    failed: bool,
    reuse: bool,
) -> std::io::Result<()> {
    if failed && !exchange.headers_sent() {
        exchange
            .write_headers(StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new())
            .await?;
    }
    exchange.response().end_response_with(reuse).await
}

fn log_unsupported(entry: &WatchdogEntry, unsupported: &Unsupported) {
    match unsupported {
        Unsupported::Unknown { code, payload } => tracing::warn!(
            connection_id = %entry.id(),
            code,
            dump = %hex_dump(payload),
            "Unknown AJP13 prefix code, ignoring packet"
        ),
        other => tracing::info!(
            connection_id = %entry.id(),
            code = other.code(),
            "Unsupported AJP13 packet, ignoring"
        ),
    }
}

/// Serve a single stream outside any connector, e.g. over an in-memory pipe.
pub async fn serve_stream<S, H>(stream: S, registration: Registration, handler: Arc<H>, ajp: AjpConfig)
where
    S: AjpStream,
    H: RequestHandler,
{
    Worker::new(handler, ajp).serve(stream, registration).await
}
