//! Serial fetch dispatcher.
//!
//! Runs one operation at a time and holds the single slot for a cooldown
//! after each settlement, whether the operation succeeded or failed. Used by
//! the deal details view so that expanding several deals never bursts the
//! remote API.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SchedulerError;
use crate::scheduler::{RequestScheduler, SchedulerConfig, SchedulerMetrics, Ticket};

/// Default cooldown between serial fetches
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1000);

/// Single-slot scheduler with a cooldown after every settlement
#[derive(Debug, Clone)]
pub struct SerialDispatcher {
    inner: RequestScheduler,
}

impl SerialDispatcher {
    pub fn new(cooldown: Duration) -> Result<Self, SchedulerError> {
        let inner = RequestScheduler::named("serial", SchedulerConfig::serial(cooldown))?;
        Ok(Self { inner })
    }

    pub fn with_defaults() -> Result<Self, SchedulerError> {
        Self::new(DEFAULT_COOLDOWN)
    }

    /// Queue an operation behind every previously enqueued one
    pub fn enqueue_serial<F, Fut, T, E>(&self, operation: F) -> Ticket<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<SchedulerError> + Send + 'static,
    {
        self.inner.submit(operation)
    }

    pub fn cooldown(&self) -> Duration {
        self.inner.config().min_spacing
    }

    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        self.inner.metrics()
    }

    pub fn shutdown(&self) {
        self.inner.shutdown()
    }

    pub async fn drain(&self) {
        self.inner.drain().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{sleep, Instant};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_at_a_time_in_order() {
        let dispatcher = SerialDispatcher::new(ms(100)).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let settled = Arc::new(Mutex::new(Vec::new()));

        let tickets: Vec<_> = (0..4u64)
            .map(|i| {
                let running = running.clone();
                let settled = settled.clone();
                dispatcher.enqueue_serial(move || async move {
                    assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0);
                    // Earlier items take longer; order must still hold
                    sleep(ms(40 - i * 10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    settled.lock().unwrap().push(i);
                    Ok::<_, SchedulerError>(i)
                })
            })
            .collect();

        for (i, ticket) in tickets.into_iter().enumerate() {
            assert_eq!(ticket.await, Ok(i as u64));
        }
        assert_eq!(*settled.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(dispatcher.metrics().snapshot().max_in_flight, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_follows_settlement() {
        let dispatcher = SerialDispatcher::with_defaults().unwrap();
        let t0 = Instant::now();

        let slow = dispatcher.enqueue_serial(|| async {
            sleep(ms(500)).await;
            Ok::<_, SchedulerError>(Instant::now())
        });
        let next = dispatcher.enqueue_serial(|| async { Ok::<_, SchedulerError>(Instant::now()) });

        let slow_done = slow.await.unwrap();
        let next_start = next.await.unwrap();

        assert!(slow_done - t0 >= ms(500));
        // 500ms of work, then the full second of cooldown
        assert!(next_start - slow_done >= ms(1000));
        assert!(next_start - t0 < ms(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_still_cools_down() {
        let dispatcher = SerialDispatcher::new(ms(300)).unwrap();
        let t0 = Instant::now();

        let failing = dispatcher.enqueue_serial(|| async {
            Err::<(), _>(SchedulerError::config("boom"))
        });
        let next = dispatcher.enqueue_serial(move || async move {
            Ok::<_, SchedulerError>(Instant::now() - t0)
        });

        assert_eq!(failing.await, Err(SchedulerError::config("boom")));
        assert!(next.await.unwrap() >= ms(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_of_bounded_scheduler() {
        let bounded = RequestScheduler::new(
            SchedulerConfig::default()
                .with_ceiling(2)
                .with_min_spacing(ms(10)),
        )
        .unwrap();
        let serial = SerialDispatcher::new(ms(10)).unwrap();

        let (hold_tx, hold_rx) = tokio::sync::oneshot::channel::<()>();
        let blocked = bounded.submit(move || async move {
            let _ = hold_rx.await;
            Ok::<_, SchedulerError>("bounded")
        });

        // The serial queue is not held up by the bounded scheduler's work
        let quick = serial.enqueue_serial(|| async { Ok::<_, SchedulerError>("serial") });
        assert_eq!(quick.await, Ok("serial"));

        assert_eq!(bounded.metrics().in_flight(), 1);
        assert_eq!(serial.metrics().in_flight(), 0);
        assert_eq!(serial.metrics().snapshot().submitted, 1);

        hold_tx.send(()).unwrap();
        assert_eq!(blocked.await, Ok("bounded"));
        assert_eq!(bounded.metrics().snapshot().submitted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_rejects_waiting_fetches() {
        let dispatcher = SerialDispatcher::new(ms(1000)).unwrap();

        let first = dispatcher.enqueue_serial(|| async { Ok::<_, SchedulerError>(1) });
        let second = dispatcher.enqueue_serial(|| async { Ok::<_, SchedulerError>(2) });

        assert_eq!(first.await, Ok(1));
        // second is waiting out the cooldown
        dispatcher.shutdown();
        assert_eq!(second.await, Err(SchedulerError::Shutdown));
    }

    #[tokio::test]
    async fn test_defaults() {
        let dispatcher = SerialDispatcher::with_defaults().unwrap();
        assert_eq!(dispatcher.cooldown(), DEFAULT_COOLDOWN);
        dispatcher.drain().await;
    }
}
