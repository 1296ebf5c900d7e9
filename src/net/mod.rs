//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection from the web server
//!     → listener.rs (accept, connection limit, TCP_NODELAY)
//!     → connection.rs (identity for logs and the watchdog registry)
//!     → Hand off to the session worker
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - The listening socket outlives connector restarts

pub mod connection;
pub mod listener;

pub use connection::ConnectionId;
pub use listener::{ConnectionPermit, Listener, ListenerError};
