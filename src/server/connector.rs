//! AJP13 connector: accept loop, watchdog, and restart supervision.
//!
//! # Responsibilities
//! - Accept web-server connections and hand each to a session worker
//! - Register every connection with the watchdog registry
//! - Run the watchdog alongside the acceptor
//! - Restart on request: stop all workers, clear the registry, respawn
//!   the acceptor
//! - Stop everything on shutdown
//!
//! # Design Decisions
//! - The bound listener survives restarts; only the accept loop and the
//!   connections it produced are replaced
//! - Workers are not awaited on restart; each drops its stream as soon as
//!   it observes its stop signal

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::config::ConnectorConfig;
use crate::handler::RequestHandler;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionId, Listener, ListenerError};
use crate::observability::metrics;
use crate::session::Worker;
use crate::watchdog::{ListenerRegistry, RestartHandle, Watchdog};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Error type for the connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("accept loop failed: {0}")]
    Acceptor(#[from] JoinError),
}

/// Serves AJP13 on one listener until shutdown.
pub struct Connector<H> {
    config: ConnectorConfig,
    worker: Worker<H>,
    registry: ListenerRegistry,
    restart: RestartHandle,
    restart_requests: mpsc::Receiver<()>,
    restarts: Arc<AtomicU64>,
}

impl<H: RequestHandler> Connector<H> {
    /// Create a new connector with the given configuration.
    pub fn new(config: ConnectorConfig, handler: H) -> Self {
        let (restart, restart_requests) = RestartHandle::channel();
        Self {
            worker: Worker::new(Arc::new(handler), config.ajp.clone()),
            config,
            registry: ListenerRegistry::new(),
            restart,
            restart_requests,
            restarts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registry of live connections.
    pub fn registry(&self) -> ListenerRegistry {
        self.registry.clone()
    }

    /// Handle that asks this connector to restart.
    pub fn restart_handle(&self) -> RestartHandle {
        self.restart.clone()
    }

    /// Shared count of completed restarts.
    pub fn restart_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.restarts)
    }

    /// Run until `shutdown` is triggered.
    pub async fn run(mut self, listener: Listener, shutdown: Shutdown) -> Result<(), ConnectorError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            address = %local_addr,
            magic_check = ?self.config.ajp.magic_check,
            idle_read_timeout_ms = self.config.ajp.idle_read_timeout_ms,
            "AJP connector starting"
        );

        let watchdog = Watchdog::new(
            self.registry.clone(),
            self.config.watchdog.clone(),
            self.restart.clone(),
        );
        let watchdog_task = tokio::spawn(watchdog.run(shutdown.clone()));

        let listener = Arc::new(listener);
        let mut acceptor = self.spawn_acceptor(&listener);

        let result = loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    tracing::info!("Connector received shutdown signal");
                    break Ok(());
                }
                Some(()) = self.restart_requests.recv() => {
                    acceptor.abort();
                    self.restart_workers();
                    acceptor = self.spawn_acceptor(&listener);
                }
                joined = &mut acceptor => {
                    break match joined {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(e.into()),
                        Err(e) => Err(e.into()),
                    };
                }
            }
        };

        acceptor.abort();
        let stopped = self.registry.stop_all();
        shutdown.trigger();
        if let Err(e) = watchdog_task.await {
            tracing::warn!(error = %e, "Watchdog task failed");
        }
        tracing::info!(stopped_connections = stopped, "AJP connector stopped");
        result
    }

    fn restart_workers(&self) {
        let restarts = self.restarts.fetch_add(1, Ordering::SeqCst) + 1;
        let stopped = self.registry.stop_all();
        self.registry.clear();
        metrics::record_restart();
        tracing::warn!(
            stopped_connections = stopped,
            restarts,
            "Connector restarted"
        );
    }

    fn spawn_acceptor(&self, listener: &Arc<Listener>) -> JoinHandle<Result<(), ListenerError>> {
        tokio::spawn(accept_loop(
            Arc::clone(listener),
            self.registry.clone(),
            self.worker.clone(),
        ))
    }
}

async fn accept_loop<H: RequestHandler>(
    listener: Arc<Listener>,
    registry: ListenerRegistry,
    worker: Worker<H>,
) -> Result<(), ListenerError> {
    loop {
        let (stream, peer, permit) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(ListenerError::Accept(e)) => {
                tracing::warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                continue;
            }
            Err(e) => return Err(e),
        };

        let registration = registry.register(ConnectionId::new(), peer);
        let worker = worker.clone();
        tokio::spawn(async move {
            worker.serve(stream, registration).await;
            drop(permit);
        });
    }
}
