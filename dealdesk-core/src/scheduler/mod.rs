//! Rate-limited request scheduling.
//!
//! Callers hand the scheduler asynchronous operations; the scheduler decides
//! when each one runs so that no more than `ceiling` execute at once and
//! every slot observes a minimum pacing interval between admissions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  submit(op) ──► Ticket<T, E>             │ ← any number of handles
//! └────────────────────┬─────────────────────┘
//!                      │ command channel
//!             ┌────────▼────────┐
//!             │   Event loop    │ ← sole owner of the state below
//!             │ ┌─────────────┐ │
//!             │ │  TaskQueue  │ │ ← strict FIFO, unbounded
//!             │ └──────┬──────┘ │
//!             │ ┌──────▼──────┐ │
//!             │ │   Limiter   │ │ ← ceiling + pacing
//!             │ └──────┬──────┘ │
//!             └────────┼────────┘
//!                      │ spawn
//!             ┌────────▼────────┐
//!             │    Operation    │ ── settlement ──► event loop
//!             └─────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - **Bounded concurrency**: never more than `ceiling` operations executing
//! - **FIFO admission**: items start in submission order
//! - **Pacing**: a slot admits again no sooner than `min_spacing` later
//! - **Exactly-once settlement**: every ticket resolves once; operation
//!   errors are passed through untouched
//! - **No leaked timers**: the pacing timer lives inside the loop and dies
//!   with it on `shutdown` or after `drain`

mod config;
mod engine;
mod limiter;
mod metrics;
mod queue;
mod ticket;

pub use config::{Pacing, SchedulerConfig};
pub use engine::RequestScheduler;
pub use limiter::{Admission, ConcurrencyLimiter};
pub use metrics::{MetricsSnapshot, SchedulerMetrics};
pub use queue::{TaskQueue, WorkItem};
pub use ticket::Ticket;
