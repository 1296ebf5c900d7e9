//! Shutdown coordination for the connector.

use std::sync::Arc;

use tokio::sync::watch;

/// Process-wide stop flag shared by the supervisor, watchdog and signal task.
///
/// Clones share one flag. A trigger is sticky, so a task that starts waiting
/// after it still returns immediately.
#[derive(Debug, Clone)]
pub struct Shutdown {
    flag: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self { flag: Arc::new(flag) }
    }

    /// Raise the flag. Later calls are no-ops.
    pub fn trigger(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolve once [`Shutdown::trigger`] has been called on any clone.
    pub async fn wait(&self) {
        let mut rx = self.flag.subscribe();
        // the sender lives in `self`, so this only returns once triggered
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
