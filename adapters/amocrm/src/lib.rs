//! amoCRM adapter for DealDesk
//!
//! Talks to the amoCRM REST API (`/leads`, `/contacts`) through a
//! rate-limited [`dealdesk_core::RequestScheduler`]. The network boundary is
//! the [`RemoteExecutor`] trait: [`HttpExecutor`] for the real API,
//! [`MockExecutor`] for offline runs and tests.
//!
//! # Example
//! ```no_run
//! use dealdesk_adapters_amocrm::{AmoCrmClient, AmoCrmConfig};
//! use dealdesk_core::RequestScheduler;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = RequestScheduler::with_defaults()?;
//! let client = AmoCrmClient::new(&AmoCrmConfig::from_env(), scheduler)?;
//! for deal in client.get_deals(true).await? {
//!     println!("{} {}", deal.id, deal.contact_name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod mock;
pub mod types;

pub use client::AmoCrmClient;
pub use config::AmoCrmConfig;
pub use error::CrmError;
pub use executor::{HttpExecutor, RemoteExecutor, RequestDescriptor};
pub use mock::MockExecutor;
pub use types::{Contact, ContactRef, Deal, DealTask, StatusColor, NOT_AVAILABLE};
