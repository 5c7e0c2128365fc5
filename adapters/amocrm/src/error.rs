//! Error types for the amoCRM adapter.

use dealdesk_core::SchedulerError;
use thiserror::Error;

/// Errors returned by amoCRM calls
#[derive(Error, Debug)]
pub enum CrmError {
    /// The API answered with a non-success status
    #[error("HTTP error! status: {status}")]
    Status { status: u16, message: String },

    /// Transport failure (connect, timeout, TLS)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON we expected
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request never ran, or its slot was lost
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Invalid client configuration
    #[error("Invalid amoCRM configuration: {0}")]
    Config(String),
}

impl CrmError {
    /// Build a status error
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code, if the API answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
