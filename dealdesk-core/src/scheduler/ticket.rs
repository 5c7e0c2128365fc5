//! The future handed back from `submit`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::SchedulerError;

/// Pending result of a submitted operation
///
/// Resolves exactly once: with the operation's own result, or with a
/// `SchedulerError` converted into `E` when the scheduler had to settle the
/// item itself. Dropping a ticket does not cancel the operation.
#[must_use = "a ticket does nothing unless awaited"]
pub struct Ticket<T, E> {
    id: u64,
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> Ticket<T, E> {
    pub(crate) fn new(id: u64, rx: oneshot::Receiver<Result<T, E>>) -> Self {
        Self { id, rx }
    }

    /// Sequence number of the work item behind this ticket
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T, E> Future for Ticket<T, E>
where
    E: From<SchedulerError>,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(E::from(SchedulerError::Abandoned))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> std::fmt::Debug for Ticket<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket").field("id", &self.id).finish()
    }
}
