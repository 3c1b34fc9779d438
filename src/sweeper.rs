//! Background task that periodically purges expired pastes.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::storage::Storage;
use crate::store::PasteStore;

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct Sweeper<S> {
    store: PasteStore<S>,
    interval: Duration,
}

impl<S: Storage + 'static> Sweeper<S> {
    pub fn new(store: PasteStore<S>) -> Self {
        Self {
            store,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Set the time between sweeps.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "sweep interval must be non-zero");
        self.interval = interval;
        self
    }

    /// Spawn the sweep loop; abort the returned handle to stop it.
    ///
    /// Each tick waits for the previous sweep to finish. Failed sweeps are
    /// logged and retried on the next tick.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                match self.store.sweep().await {
                    Ok(Some(report)) => debug!(
                        "sweep finished: scanned={}, removed={}, failed={}",
                        report.scanned, report.removed, report.failed
                    ),
                    Ok(None) => {}
                    Err(e) => warn!("sweep failed, retrying next tick: {e}"),
                }
            }
        })
    }
}
