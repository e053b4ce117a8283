use std::sync::{Arc, Mutex};

use tracing::debug;

use am_core::types::CycleReport;

/// A broadcast-style observer bus built on top of flume channels.
///
/// Every cycle runner publishes a [`CycleReport`] here after each iteration.
/// Each call to [`subscribe`] appends a new observer that will receive all
/// reports published after the subscription was created. Registration is
/// append-only; dropping the receiver is the only form of unsubscription.
/// The bus is thread-safe and can be cloned cheaply.
///
/// [`subscribe`]: ReportBus::subscribe
#[derive(Clone)]
pub struct ReportBus {
    inner: Arc<Mutex<Vec<flume::Sender<CycleReport>>>>,
}

impl ReportBus {
    /// Create a new, empty bus with no observers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a new observer and return its receiving end.
    pub fn subscribe(&self) -> flume::Receiver<CycleReport> {
        let (tx, rx) = flume::unbounded();
        let mut observers = self.inner.lock().expect("ReportBus lock poisoned");
        observers.push(tx);
        rx
    }

    /// Publish a report to all current observers.
    ///
    /// Delivery is synchronous and never blocks the publishing runner. A
    /// disconnected observer (whose receiver has been dropped) is pruned and
    /// never affects delivery to the others.
    pub fn publish(&self, report: CycleReport) {
        let mut observers = self.inner.lock().expect("ReportBus lock poisoned");
        let before = observers.len();
        observers.retain(|tx| tx.send(report.clone()).is_ok());
        let pruned = before - observers.len();
        if pruned > 0 {
            debug!(pruned, "dropped disconnected cycle observers");
        }
    }

    /// Return the number of currently connected observers.
    pub fn observer_count(&self) -> usize {
        let observers = self.inner.lock().expect("ReportBus lock poisoned");
        observers.len()
    }
}

impl Default for ReportBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use am_core::types::{CycleKind, StatsSnapshot};
    use chrono::Utc;
    use uuid::Uuid;

    fn make_report() -> CycleReport {
        CycleReport {
            cycle_id: Uuid::new_v4(),
            kind: CycleKind::ErrorDetection,
            started_at: Utc::now(),
            duration_ms: 1,
            stats: StatsSnapshot::default(),
            error: None,
        }
    }

    #[test]
    fn subscribers_receive_published_reports() {
        let bus = ReportBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();

        let report = make_report();
        bus.publish(report.clone());

        assert_eq!(rx1.recv().unwrap().cycle_id, report.cycle_id);
        assert_eq!(rx2.recv().unwrap().cycle_id, report.cycle_id);
    }

    #[test]
    fn publish_with_no_observers_is_a_noop() {
        let bus = ReportBus::new();
        bus.publish(make_report());
        assert_eq!(bus.observer_count(), 0);
    }

    #[test]
    fn disconnected_observer_is_pruned_without_affecting_others() {
        let bus = ReportBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();
        assert_eq!(bus.observer_count(), 2);

        drop(rx1);
        let report = make_report();
        bus.publish(report.clone());

        // The dead observer is gone; the live one still got the report.
        assert_eq!(bus.observer_count(), 1);
        assert_eq!(rx2.recv().unwrap().cycle_id, report.cycle_id);
    }

    #[test]
    fn subscription_only_sees_later_reports() {
        let bus = ReportBus::new();
        bus.publish(make_report());

        let rx = bus.subscribe();
        assert!(rx.try_recv().is_err(), "no backfill of earlier reports");

        let report = make_report();
        bus.publish(report.clone());
        assert_eq!(rx.recv().unwrap().cycle_id, report.cycle_id);
    }
}
