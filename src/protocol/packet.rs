//! Packet classification.

use bytes::{Buf, Bytes};

use crate::protocol::codes::prefix;
use crate::protocol::error::DecodeError;

/// One frame read from the web server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub magic: [u8; 2],
    /// Declared payload length.
    pub length: u16,
    /// Always exactly `length` bytes.
    pub payload: Bytes,
    /// The peer closed before `length` bytes arrived; the tail is zero padding.
    pub truncated: bool,
}

/// Packet types this connector recognizes but does not serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsupported {
    Shutdown,
    Ping,
    /// Any other prefix; `payload` is the full raw payload for dumping.
    Unknown { code: u8, payload: Bytes },
}

impl Unsupported {
    pub fn code(&self) -> u8 {
        match self {
            Unsupported::Shutdown => prefix::SHUTDOWN,
            Unsupported::Ping => prefix::PING,
            Unsupported::Unknown { code, .. } => *code,
        }
    }
}

/// A decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Request line, headers and attributes; payload excludes the prefix byte.
    ForwardRequest(Bytes),
    /// Raw body packet payload (inner length prefix included).
    RequestBody(Bytes),
    /// Liveness probe; payload excludes the prefix byte.
    CPing(Bytes),
    Unsupported(Unsupported),
}

impl RequestKind {
    /// Short label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::ForwardRequest(_) => "forward_request",
            RequestKind::RequestBody(_) => "request_body",
            RequestKind::CPing(_) => "cping",
            RequestKind::Unsupported(Unsupported::Shutdown) => "shutdown",
            RequestKind::Unsupported(Unsupported::Ping) => "ping",
            RequestKind::Unsupported(Unsupported::Unknown { .. }) => "unknown",
        }
    }
}

/// Classify a packet.
///
/// Only the first packet of a request cycle carries a prefix code; every
/// later packet in the same cycle is body data.
pub fn decode(packet: Packet, is_first_in_cycle: bool) -> Result<RequestKind, DecodeError> {
    let raw = packet.payload;
    if !is_first_in_cycle {
        return Ok(RequestKind::RequestBody(raw));
    }
    if raw.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let mut rest = raw.clone();
    let code = rest.get_u8();
    let kind = match code {
        prefix::FORWARD_REQUEST => RequestKind::ForwardRequest(rest),
        prefix::SHUTDOWN => RequestKind::Unsupported(Unsupported::Shutdown),
        prefix::PING => RequestKind::Unsupported(Unsupported::Ping),
        prefix::CPING => RequestKind::CPing(rest),
        code => RequestKind::Unsupported(Unsupported::Unknown { code, payload: raw }),
    };
    Ok(kind)
}

/// Data carried by a body packet payload.
///
/// Body payloads start with a 2-byte data length. An empty payload, or a
/// zero inner length, is the end-of-body signal. A length running past the
/// payload is clamped to what is there.
pub fn body_data(payload: &Bytes) -> Bytes {
    if payload.len() < 2 {
        return Bytes::new();
    }
    let declared = usize::from(u16::from_be_bytes([payload[0], payload[1]]));
    let end = (2 + declared).min(payload.len());
    payload.slice(2..end)
}
