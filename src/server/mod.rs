//! Connector server.
//!
//! # Data Flow
//! ```text
//! Listener ─accept─▶ accept loop ─spawn─▶ session worker (one task each)
//!                        │                      │
//!                        └──register──▶ ListenerRegistry ◀──sample── Watchdog
//!                                                                      │
//! supervisor ◀──────────────────── RestartHandle ◀────── deadlock ─────┘
//! ```

pub mod connector;

pub use connector::{Connector, ConnectorError};
