//! Live online/offline signal.
//!
//! Pure passthrough: the platform integration feeds state changes in via
//! [`ConnectivityMonitor::set_online`], consumers observe the boolean. The
//! monitor is how a consumer decides to show a persistent offline indicator
//! and whether to present `NetworkUnavailable` fetch errors distinctly from
//! server errors.

use tokio::sync::watch;

#[derive(Clone)]
pub struct ConnectivityMonitor {
    watch_tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (watch_tx, _) = watch::channel(initially_online);
        Self { watch_tx }
    }

    /// Push a platform connectivity change. Repeated identical states are
    /// collapsed and not re-emitted.
    pub fn set_online(&self, online: bool) {
        self.watch_tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            tracing::info!(online, "Connectivity changed");
            *current = online;
            true
        });
    }

    /// Live boolean view of connectivity.
    pub fn observe_online(&self) -> watch::Receiver<bool> {
        self.watch_tx.subscribe()
    }

    /// Point-in-time read.
    pub fn is_online(&self) -> bool {
        *self.watch_tx.borrow()
    }
}

impl Default for ConnectivityMonitor {
    /// Assume online until the platform says otherwise.
    fn default() -> Self {
        Self::new(true)
    }
}
