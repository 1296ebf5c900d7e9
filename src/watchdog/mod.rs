//! Stalled-processing watchdog.
//!
//! # Data Flow
//! ```text
//! session worker ──begin_waiting / begin_processing──▶ registry.rs (WatchdogEntry)
//!                                                          │
//!                      monitor.rs (every period) ◀─snapshot┘
//!                          │
//!                          └─ deadlock ─▶ RestartHandle ─▶ connector supervisor
//!                                                          ├─ registry.stop_all()
//!                                                          ├─ registry.clear()
//!                                                          └─ respawn accept loop
//! ```

pub mod monitor;
pub mod registry;

pub use monitor::{RestartHandle, SampleReport, Watchdog};
pub use registry::{Activity, EntrySnapshot, ListenerRegistry, Registration, WatchdogEntry};
