//! Per-connection request-cycle state machine.
//!
//! # States
//! ```text
//! Idle ──first packet of a cycle──▶ Assigned(Cycle)
//!   ▲                                   │
//!   └──────────── reset() ──────────────┘
//! ```
//!
//! Everything cycle-scoped lives inside [`Cycle`], so flags such as
//! `headers_sent` cannot exist while idle. The package counter belongs to
//! the connection and survives resets.

use thiserror::Error;

/// Declared request body length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentLength {
    /// No `content-length` header; the body (if any) is streamed.
    #[default]
    Unset,
    Known(u64),
    Zero,
}

impl ContentLength {
    /// Map a declared header value onto the tri-state.
    pub fn from_declared(declared: Option<u64>) -> Self {
        match declared {
            None => ContentLength::Unset,
            Some(0) => ContentLength::Zero,
            Some(n) => ContentLength::Known(n),
        }
    }
}

/// Body data beyond the declared content length.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("received {received} body bytes, only {declared} declared")]
pub struct BodyOverflow {
    pub declared: u64,
    pub received: u64,
}

/// Cycle-scoped fields of an assigned connection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cycle {
    content_length: ContentLength,
    total_requested: u64,
    chunked: bool,
    body_exhausted: bool,
    headers_sent: bool,
    status: Option<u16>,
    end_sent: bool,
    is_form_data: bool,
    http_session_id: Option<String>,
    servlet_path: Option<String>,
}

impl Cycle {
    pub fn content_length(&self) -> ContentLength {
        self.content_length
    }

    pub fn set_content_length(&mut self, content_length: ContentLength) {
        self.content_length = content_length;
    }

    /// Body bytes received so far in this cycle.
    pub fn total_requested(&self) -> u64 {
        self.total_requested
    }

    /// Account for `len` body bytes.
    pub fn record_body(&mut self, len: u64) -> Result<(), BodyOverflow> {
        let received = self.total_requested + len;
        match self.content_length {
            ContentLength::Known(declared) if received > declared => {
                Err(BodyOverflow { declared, received })
            }
            ContentLength::Zero if received > 0 => Err(BodyOverflow {
                declared: 0,
                received,
            }),
            _ => {
                self.total_requested = received;
                Ok(())
            }
        }
    }

    /// Whether the declared body has been fully received.
    ///
    /// Always `false` under [`ContentLength::Unset`], even after the final
    /// empty body packet; use [`Cycle::is_body_exhausted`] for that.
    pub fn is_all_data_read(&self) -> bool {
        match self.content_length {
            ContentLength::Zero => true,
            ContentLength::Known(n) => self.total_requested == n,
            ContentLength::Unset => false,
        }
    }

    /// The peer sent its end-of-body signal.
    pub fn mark_body_exhausted(&mut self) {
        self.body_exhausted = true;
    }

    pub fn is_body_exhausted(&self) -> bool {
        self.body_exhausted
    }

    /// The request declared `transfer-encoding: chunked`.
    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    pub fn set_chunked(&mut self, chunked: bool) {
        self.chunked = chunked;
    }

    /// No more body can arrive in this cycle.
    ///
    /// Without a length the body only streams when chunked; otherwise there
    /// is none.
    pub fn is_body_complete(&self) -> bool {
        match self.content_length {
            ContentLength::Unset => self.body_exhausted || !self.chunked,
            _ => self.body_exhausted || self.is_all_data_read(),
        }
    }

    /// Bytes still expected under a known length.
    pub fn remaining(&self) -> Option<u64> {
        match self.content_length {
            ContentLength::Known(n) => Some(n.saturating_sub(self.total_requested)),
            ContentLength::Zero => Some(0),
            ContentLength::Unset => None,
        }
    }

    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    /// Set `headers_sent`; `false` if it already was.
    pub fn try_mark_headers_sent(&mut self) -> bool {
        !std::mem::replace(&mut self.headers_sent, true)
    }

    /// Status code of the headers sent, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    pub fn end_sent(&self) -> bool {
        self.end_sent
    }

    /// Set `end_sent`; `false` if it already was.
    pub fn try_mark_end_sent(&mut self) -> bool {
        !std::mem::replace(&mut self.end_sent, true)
    }

    pub fn is_form_data(&self) -> bool {
        self.is_form_data
    }

    pub fn set_form_data(&mut self, is_form_data: bool) {
        self.is_form_data = is_form_data;
    }

    pub fn http_session_id(&self) -> Option<&str> {
        self.http_session_id.as_deref()
    }

    pub fn set_http_session_id(&mut self, id: Option<String>) {
        self.http_session_id = id;
    }

    pub fn servlet_path(&self) -> Option<&str> {
        self.servlet_path.as_deref()
    }

    pub fn set_servlet_path(&mut self, path: Option<String>) {
        self.servlet_path = path;
    }
}

/// Phase of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Assigned(Cycle),
}

/// State of one connection across its request cycles.
#[derive(Debug, Default)]
pub struct ConnectionState {
    package_number: u32,
    phase: Phase,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// Packets read on this connection so far.
    pub fn package_number(&self) -> u32 {
        self.package_number
    }

    /// Count one more packet read; returns the new number.
    pub fn next_package(&mut self) -> u32 {
        self.package_number = self.package_number.wrapping_add(1);
        self.package_number
    }

    /// Idle → Assigned with a fresh cycle.
    ///
    /// Calling this while already assigned discards the old cycle.
    pub fn begin_cycle(&mut self) -> &mut Cycle {
        self.phase = Phase::Assigned(Cycle::default());
        match &mut self.phase {
            Phase::Assigned(cycle) => cycle,
            Phase::Idle => unreachable!("phase was just assigned"),
        }
    }

    pub fn cycle(&self) -> Option<&Cycle> {
        match &self.phase {
            Phase::Assigned(cycle) => Some(cycle),
            Phase::Idle => None,
        }
    }

    /// Like [`ConnectionState::begin_cycle`], also lending out the package
    /// counter so body reads can advance it.
    pub fn assign(&mut self) -> (&mut Cycle, &mut u32) {
        self.phase = Phase::Assigned(Cycle::default());
        match &mut self.phase {
            Phase::Assigned(cycle) => (cycle, &mut self.package_number),
            Phase::Idle => unreachable!("phase was just assigned"),
        }
    }

    /// Content length of the current cycle; `Unset` while idle.
    pub fn content_length(&self) -> ContentLength {
        self.cycle().map(Cycle::content_length).unwrap_or_default()
    }

    pub fn headers_sent(&self) -> bool {
        self.cycle().is_some_and(Cycle::headers_sent)
    }

    pub fn end_sent(&self) -> bool {
        self.cycle().is_some_and(Cycle::end_sent)
    }

    pub fn is_all_data_read(&self) -> bool {
        self.cycle().is_some_and(Cycle::is_all_data_read)
    }

    /// Assigned → Idle, keeping the package counter.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }
}
