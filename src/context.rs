//! Run-wide context: the cancellation flag threaded through every component
//!
//! There is a single logical thread of control, so the only shared state is
//! the abort flag. It is polled at the top of every loop and inside every
//! long sleep; no other cross-component state exists.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative cancellation flag shared by the orchestrator and its helpers
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every loop head and sleep observes it
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Context passed to every component of a run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub cancel: CancelFlag,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            cancel: CancelFlag::new(),
        }
    }

    /// Sleep for `duration`, waking early if the run is cancelled.
    ///
    /// Returns `false` if cancellation was observed (the caller unwinds).
    /// The sleep is sliced so a cancel request is seen within about a second.
    pub async fn sleep(&self, duration: Duration) -> bool {
        const SLICE: Duration = Duration::from_secs(1);
        let mut remaining = duration;
        while remaining > Duration::ZERO {
            if self.cancel.is_cancelled() {
                return false;
            }
            let step = remaining.min(SLICE);
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
        !self.cancel.is_cancelled()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
