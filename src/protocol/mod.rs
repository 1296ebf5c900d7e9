//! AJP13 wire protocol.
//!
//! # Data Flow
//! ```text
//! TCP bytes
//!     → framer.rs (magic check, length, payload)
//!     → packet.rs (prefix code → RequestKind)
//!     → forward.rs (Forward Request → request descriptor)
//!
//! Response:
//!     response.rs (SEND_HEADERS / SEND_BODY_CHUNK / END_RESPONSE payloads)
//!     → framer.rs ("AB" + length)
//!     → TCP bytes
//! ```
//!
//! # Design Decisions
//! - Pure encode/decode functions; all I/O stays in the framer
//! - Prefix codes are decoded only for the first packet of a cycle
//! - Malformed input is an error value, never a panic

pub mod codes;
pub mod error;
pub mod forward;
pub mod framer;
pub mod packet;
pub mod response;

pub use error::{DecodeError, FrameError};
pub use forward::ForwardRequest;
pub use framer::{Framer, MagicCheck};
pub use packet::{decode, Packet, RequestKind, Unsupported};
