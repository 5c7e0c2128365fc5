//! The scheduler handle and the event loop behind it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::config::SchedulerConfig;
use super::limiter::{Admission, ConcurrencyLimiter};
use super::metrics::SchedulerMetrics;
use super::queue::{Outcome, TaskQueue, WorkItem};
use super::ticket::Ticket;
use crate::error::SchedulerError;

/// Messages from handles to the loop
enum Command {
    Submit(WorkItem),
    Drain(oneshot::Sender<()>),
}

/// Report from a finished operation back to the loop
struct Settlement {
    id: u64,
    admitted_at: Instant,
    outcome: Outcome,
}

/// Bounded-concurrency request scheduler
///
/// Cloning is cheap; all clones feed the same queue. The scheduler state is
/// owned by a single background task, so handles only ever send messages.
#[derive(Clone)]
pub struct RequestScheduler {
    name: Arc<str>,
    config: Arc<SchedulerConfig>,
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
    metrics: Arc<SchedulerMetrics>,
    shutdown: CancellationToken,
}

impl RequestScheduler {
    /// Create a scheduler and start its event loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::named("bounded", config)
    }

    /// Create a scheduler with the default config (ceiling 2, 1s pacing)
    pub fn with_defaults() -> Result<Self, SchedulerError> {
        Self::new(SchedulerConfig::default())
    }

    /// Create a scheduler whose log lines carry `name`
    pub fn named(name: &str, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SchedulerError::config("scheduler must be created inside a tokio runtime"))?;

        let name: Arc<str> = Arc::from(name);
        let metrics = Arc::new(SchedulerMetrics::new());
        let shutdown = CancellationToken::new();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (settle_tx, settle_rx) = mpsc::unbounded_channel();

        let event_loop = SchedulerLoop {
            name: name.clone(),
            queue: TaskQueue::new(),
            limiter: ConcurrencyLimiter::new(&config),
            metrics: metrics.clone(),
            commands: command_rx,
            intake_open: true,
            settle_tx,
            settle_rx,
            shutdown: shutdown.clone(),
            draining: false,
            drain_waiters: Vec::new(),
        };

        debug!(
            scheduler = %name,
            ceiling = config.ceiling,
            min_spacing_ms = config.min_spacing.as_millis() as u64,
            pacing = ?config.pacing,
            "Starting scheduler"
        );
        runtime.spawn(event_loop.run());

        Ok(Self {
            name,
            config: Arc::new(config),
            commands,
            next_id: Arc::new(AtomicU64::new(0)),
            metrics,
            shutdown,
        })
    }

    /// Queue an operation and get a ticket for its result
    ///
    /// `operation` is invoked once, when the item is admitted. Its error is
    /// delivered through the ticket unchanged; scheduler-side failures
    /// (shutdown, panic) arrive converted through `E: From<SchedulerError>`.
    pub fn submit<F, Fut, T, E>(&self, operation: F) -> Ticket<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<SchedulerError> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (item, ticket) = WorkItem::new(id, operation);

        self.metrics.record_submitted();
        if let Err(mpsc::error::SendError(Command::Submit(item))) =
            self.commands.send(Command::Submit(item))
        {
            trace!(scheduler = %self.name, item = id, "Submit after shutdown");
            self.metrics.record_rejected();
            item.reject(SchedulerError::Shutdown);
        }
        ticket
    }

    /// Stop accepting work, run everything already queued, then stop
    ///
    /// Resolves once the queue is empty and nothing is executing. Items
    /// submitted after this call are rejected with `SchedulerError::Shutdown`.
    pub async fn drain(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Drain(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }

    /// Stop immediately
    ///
    /// Queued items are rejected with `SchedulerError::Shutdown`. Operations
    /// that already started run to completion and still settle their tickets.
    pub fn shutdown(&self) {
        debug!(scheduler = %self.name, "Shutdown triggered");
        self.shutdown.cancel();
    }

    /// Whether the event loop is still accepting commands
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        self.metrics.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for RequestScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScheduler")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

/// State owned by the background task
struct SchedulerLoop {
    name: Arc<str>,
    queue: TaskQueue,
    limiter: ConcurrencyLimiter,
    metrics: Arc<SchedulerMetrics>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// False once every handle is gone
    intake_open: bool,
    settle_tx: mpsc::UnboundedSender<Settlement>,
    settle_rx: mpsc::UnboundedReceiver<Settlement>,
    shutdown: CancellationToken,
    draining: bool,
    drain_waiters: Vec<oneshot::Sender<()>>,
}

impl SchedulerLoop {
    async fn run(mut self) {
        loop {
            self.pump();

            if self.draining && self.queue.is_empty() && self.limiter.in_flight() == 0 {
                debug!(scheduler = %self.name, "Drained");
                break;
            }

            // Only wake for a cooling slot when something is waiting for it
            let wake_at = if self.queue.is_empty() {
                None
            } else {
                self.limiter.next_release()
            };
            let cooling = async move {
                match wake_at {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    self.reject_pending();
                    break;
                }

                Some(settlement) = self.settle_rx.recv() => {
                    self.on_settled(settlement);
                }

                command = self.commands.recv(), if self.intake_open => match command {
                    Some(Command::Submit(item)) => self.on_submit(item),
                    Some(Command::Drain(waiter)) => {
                        self.draining = true;
                        self.drain_waiters.push(waiter);
                    }
                    None => {
                        // Last handle dropped: finish what is queued, then exit
                        self.intake_open = false;
                        self.draining = true;
                    }
                },

                _ = cooling => {}
            }
        }

        self.close_intake();
        for waiter in self.drain_waiters.drain(..) {
            let _ = waiter.send(());
        }
        debug!(scheduler = %self.name, "Scheduler loop exited");
    }

    fn on_submit(&mut self, item: WorkItem) {
        if self.draining {
            trace!(scheduler = %self.name, item = item.id(), "Submit while draining");
            self.metrics.record_rejected();
            item.reject(SchedulerError::Shutdown);
            return;
        }

        trace!(
            scheduler = %self.name,
            item = item.id(),
            queue_depth = self.queue.len() + 1,
            "Work item enqueued"
        );
        self.queue.enqueue(item);
    }

    fn on_settled(&mut self, settlement: Settlement) {
        let now = Instant::now();
        self.limiter.settle(settlement.admitted_at, now);

        match settlement.outcome {
            Outcome::Panicked => warn!(
                scheduler = %self.name,
                item = settlement.id,
                "Operation panicked"
            ),
            outcome => trace!(
                scheduler = %self.name,
                item = settlement.id,
                ?outcome,
                elapsed_ms = now.duration_since(settlement.admitted_at).as_millis() as u64,
                "Work item settled"
            ),
        }
    }

    /// Admit queued items for as long as the limiter allows
    fn pump(&mut self) {
        while !self.queue.is_empty() {
            let now = Instant::now();
            if self.limiter.try_admit(now) != Admission::Granted {
                break;
            }
            if let Some(item) = self.queue.dequeue_next() {
                self.admit(item, now);
            }
        }
    }

    fn admit(&mut self, item: WorkItem, admitted_at: Instant) {
        let id = item.id();
        let wait = item.queued_for(admitted_at);
        self.metrics.record_admitted(wait);

        debug!(
            scheduler = %self.name,
            item = id,
            wait_ms = wait.as_millis() as u64,
            in_flight = self.limiter.in_flight(),
            queue_depth = self.queue.len(),
            "Work item admitted"
        );

        let running = item.start();
        let settle_tx = self.settle_tx.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let outcome = running.await;
            metrics.record_settled(outcome == Outcome::Succeeded);
            // The loop may already be gone after shutdown
            let _ = settle_tx.send(Settlement {
                id,
                admitted_at,
                outcome,
            });
        });
    }

    fn reject_pending(&mut self) {
        let pending = self.queue.drain_all();
        if !pending.is_empty() {
            debug!(
                scheduler = %self.name,
                rejected = pending.len(),
                "Rejecting queued work on shutdown"
            );
        }
        for item in pending {
            self.metrics.record_rejected();
            item.reject(SchedulerError::Shutdown);
        }
    }

    /// Refuse further commands and settle anything still buffered in the channel
    fn close_intake(&mut self) {
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Submit(item) => {
                    self.metrics.record_rejected();
                    item.reject(SchedulerError::Shutdown);
                }
                Command::Drain(waiter) => self.drain_waiters.push(waiter),
            }
        }
    }
}
