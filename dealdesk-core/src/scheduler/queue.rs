//! Work items and the FIFO task queue.
//!
//! A `WorkItem` owns the caller's operation together with the one-shot
//! channel its result travels back on. Both ways out of the queue consume
//! the item, so an item can be started or rejected, never both and never twice.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};

use super::ticket::Ticket;
use crate::error::SchedulerError;

/// How an admitted operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Succeeded,
    Failed,
    Panicked,
}

/// Type-erased operation plus its continuation
trait Job: Send {
    /// Invoke the operation and return the future that settles it
    fn start(self: Box<Self>) -> BoxFuture<'static, Outcome>;

    /// Settle the item without running it
    fn reject(self: Box<Self>, err: SchedulerError);
}

struct Pending<F, T, E> {
    operation: F,
    reply: oneshot::Sender<Result<T, E>>,
}

impl<F, Fut, T, E> Job for Pending<F, T, E>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<SchedulerError> + Send + 'static,
{
    fn start(self: Box<Self>) -> BoxFuture<'static, Outcome> {
        let Pending { operation, reply } = *self;

        // The operation is invoked right here, in admission order
        let fut = match std::panic::catch_unwind(AssertUnwindSafe(operation)) {
            Ok(fut) => fut,
            Err(payload) => {
                let _ = reply.send(Err(E::from(SchedulerError::from_panic(payload))));
                return futures::future::ready(Outcome::Panicked).boxed();
            }
        };

        async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(value)) => {
                    let _ = reply.send(Ok(value));
                    Outcome::Succeeded
                }
                Ok(Err(err)) => {
                    let _ = reply.send(Err(err));
                    Outcome::Failed
                }
                Err(payload) => {
                    let _ = reply.send(Err(E::from(SchedulerError::from_panic(payload))));
                    Outcome::Panicked
                }
            }
        }
        .boxed()
    }

    fn reject(self: Box<Self>, err: SchedulerError) {
        let _ = self.reply.send(Err(E::from(err)));
    }
}

/// One unit of submitted work
pub struct WorkItem {
    id: u64,
    enqueued_at: Instant,
    job: Box<dyn Job>,
}

impl WorkItem {
    /// Wrap an operation, returning the item and the ticket its result lands on
    pub fn new<F, Fut, T, E>(id: u64, operation: F) -> (Self, Ticket<T, E>)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<SchedulerError> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let item = Self {
            id,
            enqueued_at: Instant::now(),
            job: Box::new(Pending { operation, reply }),
        };
        (item, Ticket::new(id, rx))
    }

    /// Sequence number assigned at submission
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Time spent waiting since submission
    pub fn queued_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }

    /// Invoke the operation; the returned future settles the caller's ticket
    pub(crate) fn start(self) -> BoxFuture<'static, Outcome> {
        self.job.start()
    }

    /// Settle the caller's ticket with a scheduler error instead of running
    pub fn reject(self, err: SchedulerError) {
        self.job.reject(err)
    }
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("enqueued_at", &self.enqueued_at)
            .finish_non_exhaustive()
    }
}

/// Unbounded FIFO of pending work items
#[derive(Debug, Default)]
pub struct TaskQueue {
    items: VecDeque<WorkItem>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail
    pub fn enqueue(&mut self, item: WorkItem) {
        self.items.push_back(item);
    }

    /// Remove and return the head, if any
    pub fn dequeue_next(&mut self) -> Option<WorkItem> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take every pending item, oldest first
    pub fn drain_all(&mut self) -> Vec<WorkItem> {
        self.items.drain(..).collect()
    }
}
