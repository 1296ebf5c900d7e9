//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → stop workers and watchdog → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One sticky `watch` flag shared by the connector, watchdog and signal task
//! - Restart is separate from shutdown; see `watchdog::RestartHandle`

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
