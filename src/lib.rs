//! AJP13 connector library.
//!
//! Terminates the AJP13 protocol a front-end web server uses to forward
//! HTTP requests, hands each request to a [`RequestHandler`], and watches
//! for request processing that has stalled on every connection at once.

pub mod config;
pub mod handler;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod server;
pub mod session;
pub mod watchdog;

pub use config::ConnectorConfig;
pub use handler::{AjpStream, EchoHandler, RequestHandler};
pub use lifecycle::Shutdown;
pub use server::{Connector, ConnectorError};
pub use session::{Exchange, ExchangeError};
