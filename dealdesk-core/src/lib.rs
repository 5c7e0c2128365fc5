// DealDesk Core Library
//
// Rate-limited request scheduling: a bounded-concurrency scheduler and a
// serial dispatcher built from the same queue and limiter.

pub mod dispatcher;
pub mod error;
pub mod scheduler;

pub use dispatcher::SerialDispatcher;
pub use error::SchedulerError;
pub use scheduler::{
    Admission, ConcurrencyLimiter, MetricsSnapshot, Pacing, RequestScheduler, SchedulerConfig,
    SchedulerMetrics, TaskQueue, Ticket, WorkItem,
};
