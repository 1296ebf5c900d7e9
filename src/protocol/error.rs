//! Protocol-level error types.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure to read a framed packet off the wire.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Peer closed the stream at or before a packet boundary.
    #[error("stream closed by peer")]
    StreamClosed,

    /// No packet arrived within the idle-read timeout.
    #[error("no packet received within {0:?}")]
    IdleTimeout(Duration),

    /// Magic bytes did not pass the configured check.
    ///
    /// `dump` holds the magic bytes followed by whatever was immediately
    /// readable afterwards.
    #[error("invalid magic bytes {magic:02x?} ({} bytes read)", .dump.len())]
    InvalidSequence { magic: [u8; 2], dump: Vec<u8> },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure to interpret a packet payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty payload at start of request cycle")]
    EmptyPayload,

    #[error("payload ended while reading {0}")]
    Truncated(&'static str),

    #[error("missing NUL terminator after {0}")]
    MissingTerminator(&'static str),

    #[error("required field {0} is null")]
    NullField(&'static str),

    #[error("unknown method code {0}")]
    UnknownMethod(u8),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unknown attribute code {0:#04x}")]
    UnknownAttribute(u8),

    #[error("invalid content-length {0:?}")]
    InvalidContentLength(String),
}
