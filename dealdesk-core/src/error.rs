//! Error types for the DealDesk core library
//!
//! The scheduler never invents failures for the work it runs: whatever an
//! operation returns is handed back to its caller untouched. The variants
//! below cover the few situations where the scheduler itself has to settle
//! a work item.
//!
//! # Error Hierarchy
//!
//! ```text
//! SchedulerError
//! ├── Shutdown       - item discarded by shutdown / submitted after drain
//! ├── Panicked       - the operation panicked while executing
//! ├── Abandoned      - continuation dropped without a value (internal bug)
//! └── InvalidConfig  - rejected at construction time
//! ```
//!
//! # Usage
//!
//! Callers pick their own error type for submitted work and make it
//! convertible from `SchedulerError`:
//!
//! ```rust,ignore
//! #[derive(Debug, thiserror::Error)]
//! enum FetchError {
//!     #[error("HTTP {0}")]
//!     Status(u16),
//!     #[error(transparent)]
//!     Scheduler(#[from] SchedulerError),
//! }
//! ```

use thiserror::Error;

/// Errors produced by the scheduler itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler stopped before the item was admitted
    #[error("Scheduler is shut down, work item was not executed")]
    Shutdown,

    /// The operation panicked while executing
    #[error("Operation panicked: {0}")]
    Panicked(String),

    /// The continuation was dropped without being fulfilled
    #[error("Work item was abandoned before it settled")]
    Abandoned,

    /// Invalid scheduler configuration
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}

impl SchedulerError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Build a `Panicked` error from a `catch_unwind` payload
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_error_display() {
        let err = SchedulerError::config("ceiling must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid scheduler configuration: ceiling must be at least 1"
        );

        let err = SchedulerError::Panicked("boom".to_string());
        assert_eq!(err.to_string(), "Operation panicked: boom");
    }

    #[test]
    fn test_from_panic_payloads() {
        let err = SchedulerError::from_panic(Box::new("static str"));
        assert_eq!(err, SchedulerError::Panicked("static str".to_string()));

        let err = SchedulerError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err, SchedulerError::Panicked("owned".to_string()));

        let err = SchedulerError::from_panic(Box::new(42u32));
        assert_eq!(err, SchedulerError::Panicked("unknown panic payload".to_string()));
    }

    #[test]
    fn test_converts_into_anyhow() {
        let err: anyhow::Error = SchedulerError::Shutdown.into();
        assert!(err.downcast_ref::<SchedulerError>().is_some());
    }
}
