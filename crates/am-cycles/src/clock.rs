use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

// ---------------------------------------------------------------------------
// CancelToken: cooperative per-activation stop signal
// ---------------------------------------------------------------------------

/// Broadcast-based cancellation token, one per cycle activation.
///
/// The runner `select!`s on a subscribed receiver inside its timed wait, so
/// firing the token wakes a blocked wait immediately; the atomic flag backs
/// the cheap post-wake liveness check. Tokens are never re-armed; every
/// `start()` issues a fresh one.
///
/// ```ignore
/// let cancel = CancelToken::new();
/// let mut fired = cancel.subscribe();
///
/// tokio::select! {
///     _ = fired.recv() => { /* wind down */ }
///     _ = do_work() => {}
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CancelToken {
    /// Broadcast sender; firing it wakes every blocked wait on this token.
    trigger: broadcast::Sender<()>,
    /// Atomic flag for cheap polling.
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (trigger, _) = broadcast::channel(1);
        Self {
            trigger,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe for a wakeup when the token fires.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.trigger.subscribe()
    }

    /// Check whether the token has fired (non-blocking).
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fire the token. Returns true on the first call, false on repeats.
    pub fn cancel(&self) -> bool {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            let _ = self.trigger.send(());
            true
        } else {
            debug!("cancel token already fired");
            false
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// CycleClock: interruptible timed wait
// ---------------------------------------------------------------------------

/// How one timed wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full interval elapsed; the cycle is due.
    Elapsed,
    /// The cancel token fired first.
    Cancelled,
}

/// Sleeps for the cycle interval OR until the cancel token fires, whichever
/// comes first. This is the only blocking point inside a cycle's loop.
#[derive(Debug, Clone)]
pub struct CycleClock {
    interval: Duration,
}

impl CycleClock {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait out one interval.
    ///
    /// Subscribes before checking the flag so a cancel landing between the
    /// two can never be missed: it is visible either through the flag or
    /// through the receiver.
    pub async fn wait(&self, cancel: &CancelToken) -> WaitOutcome {
        let mut fired = cancel.subscribe();
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.interval) => WaitOutcome::Elapsed,
            _ = fired.recv() => WaitOutcome::Cancelled,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
