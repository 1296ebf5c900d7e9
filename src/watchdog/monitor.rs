//! Periodic deadlock detection.
//!
//! # Responsibilities
//! - Sample every registered connection once per period
//! - Log connections processing longer than the threshold
//! - Request a connector restart when all processing connections are stuck
//!
//! # Design Decisions
//! - A single slow request is reported, never escalated; only the
//!   "every processing connection exceeded" verdict is
//! - Sampling takes `now` as a parameter so verdicts are deterministic
//! - Restart requests coalesce; at most one is ever pending

use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::config::WatchdogConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::watchdog::registry::{Activity, ListenerRegistry};

/// Asks the connector to restart.
#[derive(Debug, Clone)]
pub struct RestartHandle {
    tx: mpsc::Sender<()>,
}

impl RestartHandle {
    /// Create a handle and the receiver the connector listens on.
    pub fn channel() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Request a restart. Returns `false` if nobody is listening anymore.
    pub fn request_restart(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Counters from one sampling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleReport {
    pub waiting: usize,
    pub processing: usize,
    pub exceeded: usize,
}

impl SampleReport {
    /// Every processing connection has exceeded the threshold.
    pub fn is_deadlock(&self) -> bool {
        self.processing > 0 && self.exceeded == self.processing
    }
}

/// Samples the registry on a fixed period.
pub struct Watchdog {
    registry: ListenerRegistry,
    config: WatchdogConfig,
    restart: RestartHandle,
}

impl Watchdog {
    /// Create a new watchdog over `registry`.
    pub fn new(registry: ListenerRegistry, config: WatchdogConfig, restart: RestartHandle) -> Self {
        Self {
            registry,
            config,
            restart,
        }
    }

    /// Count waiting, processing and exceeded connections as of `now`.
    pub fn sample(&self, now: Instant) -> SampleReport {
        let max_processing = self.config.max_processing_time();
        let mut report = SampleReport::default();

        for entry in self.registry.snapshot() {
            match &entry.activity {
                Activity::Waiting => report.waiting += 1,
                Activity::Processing { since, request } => {
                    report.processing += 1;
                    let elapsed = now.saturating_duration_since(*since);
                    if elapsed > max_processing {
                        report.exceeded += 1;
                        tracing::warn!(
                            connection_id = %entry.id,
                            peer_addr = %entry.peer,
                            request = %request,
                            elapsed_ms = elapsed.as_millis() as u64,
                            max_processing_ms = self.config.max_processing_ms,
                            "Request exceeds max processing time"
                        );
                    }
                }
            }
        }
        report
    }

    /// Sample once and escalate on deadlock. Returns the report.
    pub fn tick(&self, now: Instant) -> SampleReport {
        let report = self.sample(now);
        metrics::record_watchdog_sample(report.waiting, report.processing, report.exceeded);
        tracing::debug!(
            waiting = report.waiting,
            processing = report.processing,
            exceeded = report.exceeded,
            "Watchdog sample"
        );

        if report.is_deadlock() {
            metrics::record_deadlock();
            if self.config.restart_on_deadlock {
                tracing::error!(
                    processing = report.processing,
                    "All processing connections exceed max processing time, restarting connector"
                );
                if !self.restart.request_restart() {
                    tracing::warn!("Connector is gone, restart request dropped");
                }
            } else {
                tracing::error!(
                    processing = report.processing,
                    "All processing connections exceed max processing time, restart disabled"
                );
            }
        }
        report
    }

    pub async fn run(self, shutdown: Shutdown) {
        if !self.config.enabled {
            tracing::info!("Watchdog disabled");
            return;
        }

        tracing::info!(
            period_ms = self.config.period_ms,
            max_processing_ms = self.config.max_processing_ms,
            restart_on_deadlock = self.config.restart_on_deadlock,
            "Watchdog starting"
        );

        let mut ticker = time::interval(self.config.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(Instant::now());
                }
                _ = shutdown.wait() => {
                    tracing::info!("Watchdog received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ConnectionId;
    use crate::watchdog::registry::Registration;
    use std::net::SocketAddr;
    use std::time::Duration;

    fn config(restart_on_deadlock: bool) -> WatchdogConfig {
        WatchdogConfig {
            enabled: true,
            period_ms: 1_000,
            max_processing_ms: 60_000,
            restart_on_deadlock,
        }
    }

    fn register(registry: &ListenerRegistry) -> Registration {
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        registry.register(ConnectionId::new(), peer)
    }

    fn processing(registry: &ListenerRegistry, since: Instant) -> Registration {
        let guard = register(registry);
        guard.entry().begin_processing_at(since, "GET /slow HTTP/1.1");
        guard
    }

    #[test]
    fn all_processing_exceeded_restarts() {
        let registry = ListenerRegistry::new();
        let (restart, mut requests) = RestartHandle::channel();
        let watchdog = Watchdog::new(registry.clone(), config(true), restart);

        let base = Instant::now();
        let _a = processing(&registry, base);
        let _b = processing(&registry, base);
        let _idle = register(&registry);

        let report = watchdog.tick(base + Duration::from_secs(61));
        assert_eq!(
            report,
            SampleReport {
                waiting: 1,
                processing: 2,
                exceeded: 2
            }
        );
        assert!(report.is_deadlock());
        assert!(requests.try_recv().is_ok());
    }

    #[test]
    fn one_healthy_request_prevents_restart() {
        let registry = ListenerRegistry::new();
        let (restart, mut requests) = RestartHandle::channel();
        let watchdog = Watchdog::new(registry.clone(), config(true), restart);

        let base = Instant::now();
        let _a = processing(&registry, base);
        let _b = processing(&registry, base);
        let _fresh = processing(&registry, base + Duration::from_secs(30));

        let report = watchdog.tick(base + Duration::from_secs(61));
        assert_eq!(report.processing, 3);
        assert_eq!(report.exceeded, 2);
        assert!(!report.is_deadlock());
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn nothing_processing_is_not_a_deadlock() {
        let registry = ListenerRegistry::new();
        let (restart, mut requests) = RestartHandle::channel();
        let watchdog = Watchdog::new(registry.clone(), config(true), restart);
        let _idle = register(&registry);

        let report = watchdog.tick(Instant::now());
        assert_eq!(report.waiting, 1);
        assert!(!report.is_deadlock());
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn deadlock_without_permission_only_logs() {
        let registry = ListenerRegistry::new();
        let (restart, mut requests) = RestartHandle::channel();
        let watchdog = Watchdog::new(registry.clone(), config(false), restart);

        let base = Instant::now();
        let _a = processing(&registry, base);
        assert!(watchdog.tick(base + Duration::from_secs(61)).is_deadlock());
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn exactly_at_threshold_is_not_exceeded() {
        let registry = ListenerRegistry::new();
        let (restart, _requests) = RestartHandle::channel();
        let watchdog = Watchdog::new(registry.clone(), config(true), restart);

        let base = Instant::now();
        let _a = processing(&registry, base);
        assert_eq!(watchdog.sample(base + Duration::from_secs(60)).exceeded, 0);
    }

    #[tokio::test]
    async fn unvalidated_zero_period_still_runs() {
        let registry = ListenerRegistry::new();
        let (restart, _requests) = RestartHandle::channel();
        let watchdog = Watchdog::new(
            registry,
            WatchdogConfig {
                period_ms: 0,
                ..config(false)
            },
            restart,
        );
        let shutdown = Shutdown::new();
        let task = tokio::spawn(watchdog.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn restart_requests_coalesce() {
        let (restart, mut requests) = RestartHandle::channel();
        assert!(restart.request_restart());
        assert!(restart.request_restart());
        assert!(requests.try_recv().is_ok());
        assert!(requests.try_recv().is_err());

        drop(requests);
        assert!(!restart.request_restart());
    }
}
