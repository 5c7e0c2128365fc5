//! Metrics for a scheduler instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters describing one scheduler's traffic
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    /// Total items submitted
    pub submitted: AtomicU64,

    /// Items that started executing
    pub admitted: AtomicU64,

    /// Items whose operation returned `Ok`
    pub succeeded: AtomicU64,

    /// Items whose operation returned `Err` or panicked
    pub failed: AtomicU64,

    /// Items rejected by shutdown before they ran
    pub rejected: AtomicU64,

    /// Items currently waiting in the queue
    pub queue_depth: AtomicU64,

    /// Items currently executing
    pub in_flight: AtomicU64,

    /// Highest number of items observed executing at once
    pub max_in_flight: AtomicU64,

    /// Total time items spent queued, in milliseconds
    pub total_queue_wait_ms: AtomicU64,
}

impl SchedulerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new submission entering the queue
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an item leaving the queue and starting to execute
    pub fn record_admitted(&self, wait_time: Duration) {
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
        self.admitted.fetch_add(1, Ordering::Relaxed);
        self.total_queue_wait_ms
            .fetch_add(wait_time.as_millis() as u64, Ordering::Relaxed);

        let running = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.max_in_flight.fetch_max(running, Ordering::Relaxed);
    }

    /// Record an executing item settling
    pub fn record_settled(&self, success: bool) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a submitted item settled with `Shutdown` instead of running
    pub fn record_rejected(&self) {
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current queue depth
    pub fn queue_depth(&self) -> u64 {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Get current number of executing items
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Calculate average queue wait time in milliseconds
    pub fn avg_queue_wait_ms(&self) -> f64 {
        let admitted = self.admitted.load(Ordering::Relaxed);
        if admitted == 0 {
            return 0.0;
        }
        self.total_queue_wait_ms.load(Ordering::Relaxed) as f64 / admitted as f64
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            max_in_flight: self.max_in_flight.load(Ordering::Relaxed),
            avg_queue_wait_ms: self.avg_queue_wait_ms(),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub admitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
    pub queue_depth: u64,
    pub in_flight: u64,
    pub max_in_flight: u64,
    pub avg_queue_wait_ms: f64,
}

impl MetricsSnapshot {
    /// Items that reached a terminal state
    pub fn settled(&self) -> u64 {
        self.succeeded + self.failed + self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = SchedulerMetrics::new();

        metrics.record_submitted();
        metrics.record_submitted();
        assert_eq!(metrics.queue_depth(), 2);

        metrics.record_admitted(Duration::from_millis(100));
        metrics.record_admitted(Duration::from_millis(300));
        assert_eq!(metrics.queue_depth(), 0);
        assert_eq!(metrics.in_flight(), 2);

        metrics.record_settled(true);
        metrics.record_settled(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.submitted, 2);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(snapshot.max_in_flight, 2);
        assert_eq!(snapshot.avg_queue_wait_ms, 200.0);
        assert_eq!(snapshot.settled(), 2);
    }

    #[test]
    fn test_max_in_flight_is_high_water_mark() {
        let metrics = SchedulerMetrics::new();

        for _ in 0..3 {
            metrics.record_submitted();
            metrics.record_admitted(Duration::ZERO);
        }
        for _ in 0..3 {
            metrics.record_settled(true);
        }
        metrics.record_submitted();
        metrics.record_admitted(Duration::ZERO);

        assert_eq!(metrics.in_flight(), 1);
        assert_eq!(metrics.snapshot().max_in_flight, 3);
    }

    #[test]
    fn test_rejections() {
        let metrics = SchedulerMetrics::new();

        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_rejected();
        metrics.record_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.submitted, 2);
        assert_eq!(snapshot.rejected, 2);
        assert_eq!(snapshot.queue_depth, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(SchedulerMetrics::new().snapshot()).unwrap();
        assert_eq!(json["submitted"], 0);
        assert_eq!(json["avg_queue_wait_ms"], 0.0);
    }
}
