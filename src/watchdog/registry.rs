//! Live connection registry shared by workers and the watchdog.
//!
//! # Responsibilities
//! - Hold one [`WatchdogEntry`] per open connection
//! - Deregister entries when their worker ends, even on panic
//! - Stop every worker at once for a restart
//!
//! # Design Decisions
//! - `DashMap` so registration never contends with a watchdog sweep
//! - Each entry carries its own `watch` stop flag; a worker selects on it
//!   around every blocking point
//! - Activity sits behind a short-lived `Mutex`; the watchdog only ever
//!   reads a cloned snapshot

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;

use crate::net::ConnectionId;
use crate::observability::metrics;

/// What a connection's worker is doing right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    /// Blocked reading the next request.
    Waiting,
    /// Executing a decoded request.
    Processing { since: Instant, request: String },
}

/// A point-in-time copy of one entry.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub activity: Activity,
}

impl EntrySnapshot {
    pub fn is_waiting(&self) -> bool {
        matches!(self.activity, Activity::Waiting)
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.activity, Activity::Processing { .. })
    }

    /// Time spent processing as of `now`; `None` while waiting.
    pub fn processing_time(&self, now: Instant) -> Option<Duration> {
        match &self.activity {
            Activity::Processing { since, .. } => Some(now.saturating_duration_since(*since)),
            Activity::Waiting => None,
        }
    }
}

/// Watchdog view of one connection plus its stop signal.
#[derive(Debug)]
pub struct WatchdogEntry {
    id: ConnectionId,
    peer: SocketAddr,
    activity: Mutex<Activity>,
    stop: watch::Sender<bool>,
}

impl WatchdogEntry {
    /// Create a new entry in the waiting state.
    pub fn new(id: ConnectionId, peer: SocketAddr) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            id,
            peer,
            activity: Mutex::new(Activity::Waiting),
            stop,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn activity(&self) -> MutexGuard<'_, Activity> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin_waiting(&self) {
        *self.activity() = Activity::Waiting;
    }

    /// Mark the start of request processing.
    pub fn begin_processing(&self, request: impl Into<String>) {
        self.begin_processing_at(Instant::now(), request);
    }

    pub fn begin_processing_at(&self, since: Instant, request: impl Into<String>) {
        *self.activity() = Activity::Processing {
            since,
            request: request.into(),
        };
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            peer: self.peer,
            activity: self.activity().clone(),
        }
    }

    /// Receiver that flips to `true` when the worker must stop.
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Resolve once [`WatchdogEntry::stop`] has been called.
    pub async fn stopped(&self) {
        let mut signal = self.stop.subscribe();
        // the sender lives in `self`, so this only returns once stopped
        let _ = signal.wait_for(|stopped| *stopped).await;
    }

    /// Ask the owning worker to drop its connection.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }
}

/// Concurrent map of open connections.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    entries: Arc<DashMap<ConnectionId, Arc<WatchdogEntry>>>,
}

impl ListenerRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection; it is removed again when the guard drops.
    pub fn register(&self, id: ConnectionId, peer: SocketAddr) -> Registration {
        let entry = Arc::new(WatchdogEntry::new(id, peer));
        self.entries.insert(id, Arc::clone(&entry));
        metrics::record_active_connections(self.entries.len());
        tracing::trace!(connection_id = %id, peer_addr = %peer, "Connection registered");
        Registration {
            registry: self.clone(),
            entry,
        }
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<WatchdogEntry>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot every registered connection.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.entries.iter().map(|entry| entry.value().snapshot()).collect()
    }

    /// Signal every registered worker to stop. Returns how many were signalled.
    pub fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for entry in self.entries.iter() {
            entry.value().stop();
            stopped += 1;
        }
        stopped
    }

    /// Forget every entry without waiting for the workers.
    pub fn clear(&self) {
        self.entries.clear();
        metrics::record_active_connections(0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn deregister(&self, id: ConnectionId) {
        if self.entries.remove(&id).is_some() {
            metrics::record_active_connections(self.entries.len());
            tracing::trace!(connection_id = %id, "Connection deregistered");
        }
    }
}

/// Keeps a connection registered for as long as it lives.
#[derive(Debug)]
pub struct Registration {
    registry: ListenerRegistry,
    entry: Arc<WatchdogEntry>,
}

impl Registration {
    pub fn entry(&self) -> &Arc<WatchdogEntry> {
        &self.entry
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(self.entry.id());
    }
}
