//! Connection sessions.
//!
//! # Data Flow
//! ```text
//! accepted stream
//!     → worker.rs (packet loop, watchdog activity, stop signal)
//!     → state.rs (Idle / Assigned(Cycle), package counter)
//!     → exchange.rs (handed to the RequestHandler)
//!         ├─ body.rs (pre-read chunk, GET_BODY_CHUNK on demand)
//!         └─ emitter.rs (SEND_HEADERS / SEND_BODY_CHUNK / END_RESPONSE)
//! ```
//!
//! # Design Decisions
//! - One task owns a connection; nothing else touches its stream
//! - Body data is only ever requested, never polled for
//! - The worker, not the handler, guarantees END_RESPONSE

pub mod body;
pub mod emitter;
pub mod exchange;
pub mod state;
pub mod worker;

pub use body::BodyReader;
pub use emitter::ResponseEmitter;
pub use exchange::{Exchange, ExchangeError};
pub use state::{BodyOverflow, ConnectionState, ContentLength, Cycle};
pub use worker::{serve_stream, Worker};
