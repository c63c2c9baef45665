use std::time::Duration;

use tokio::task::JoinHandle;

/// Default delay between the first tree event of a burst and the refresh.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(150);

/// Collapses bursts of tree-mutation events into a single refresh.
///
/// The first request arms a timer; requests that arrive while it is armed
/// are absorbed. The timer owner calls [`RefreshCoalescer::fire`] when it
/// goes off, which re-opens the window for the next burst.
#[derive(Debug)]
pub struct RefreshCoalescer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Default for RefreshCoalescer {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_DELAY)
    }
}

impl RefreshCoalescer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    #[cfg(test)]
    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Request a refresh. `arm` is called with the delay only when no timer
    /// is pending, and must return the spawned timer task. Returns whether a
    /// new timer was armed.
    pub fn request<F>(&mut self, arm: F) -> bool
    where
        F: FnOnce(Duration) -> JoinHandle<()>,
    {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(arm(self.delay));
        true
    }

    /// The pending timer went off.
    pub fn fire(&mut self) {
        self.pending = None;
    }

    /// Drop the pending timer without refreshing.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for RefreshCoalescer {
    fn drop(&mut self) {
        self.cancel();
    }
}
