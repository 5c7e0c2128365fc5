//! amoCRM API client.
//!
//! Every outbound call is submitted to a `RequestScheduler`, so the client
//! never has more than the scheduler's ceiling of requests in flight no
//! matter how many callers use it concurrently.

use std::sync::Arc;

use dealdesk_core::RequestScheduler;
use futures::future::try_join_all;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::AmoCrmConfig;
use crate::error::CrmError;
use crate::executor::{HttpExecutor, RemoteExecutor, RequestDescriptor};
use crate::types::{parse_deal, parse_deals, Contact, Deal};

/// Rate-limited amoCRM client
#[derive(Clone)]
pub struct AmoCrmClient {
    executor: Arc<dyn RemoteExecutor>,
    scheduler: RequestScheduler,
    access_token: String,
}

impl AmoCrmClient {
    /// Client talking HTTP to `config.base_url`
    pub fn new(config: &AmoCrmConfig, scheduler: RequestScheduler) -> Result<Self, CrmError> {
        let executor = HttpExecutor::new(config)?;
        info!(url = %executor.base_url(), "Creating amoCRM client");
        Ok(Self::with_executor(
            Arc::new(executor),
            config.access_token.clone(),
            scheduler,
        ))
    }

    /// Client using an arbitrary executor
    pub fn with_executor(
        executor: Arc<dyn RemoteExecutor>,
        access_token: impl Into<String>,
        scheduler: RequestScheduler,
    ) -> Self {
        Self {
            executor,
            scheduler,
            access_token: access_token.into(),
        }
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        &self.scheduler
    }

    /// Queue one API call behind the scheduler and wait for its result
    #[instrument(skip(self, body))]
    pub async fn make_request(
        &self,
        path: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<Value, CrmError> {
        let request = RequestDescriptor::new(method, path)
            .with_body(body)
            .with_bearer(&self.access_token)?;

        let executor = self.executor.clone();
        self.scheduler
            .submit(move || async move { executor.execute(request).await })
            .await
    }

    /// List deals, optionally resolving each deal's first contact
    ///
    /// Contact lookups are queued concurrently; the first failure fails the
    /// whole listing.
    #[instrument(skip(self))]
    pub async fn get_deals(&self, with_contacts: bool) -> Result<Vec<Deal>, CrmError> {
        let listing = self
            .make_request("/leads?with=contacts", Method::GET, None)
            .await?;
        let mut deals = parse_deals(listing)?;
        debug!(count = deals.len(), "Fetched deals");

        if !with_contacts {
            return Ok(deals);
        }

        let lookups = deals.iter().map(|deal| async move {
            match deal.primary_contact_id() {
                Some(id) => self.get_contact(id).await.map(Some),
                None => Ok(None),
            }
        });
        let contacts = try_join_all(lookups).await?;

        for (deal, contact) in deals.iter_mut().zip(contacts) {
            deal.contact = contact;
        }
        Ok(deals)
    }

    pub async fn get_contact(&self, contact_id: u64) -> Result<Contact, CrmError> {
        let value = self
            .make_request(&format!("/contacts/{}", contact_id), Method::GET, None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fetch one deal with its tasks
    pub async fn get_deal_details(&self, deal_id: u64) -> Result<Deal, CrmError> {
        let value = self
            .make_request(&format!("/leads/{}?with=tasks", deal_id), Method::GET, None)
            .await?;
        parse_deal(value)
    }
}

impl std::fmt::Debug for AmoCrmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmoCrmClient")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExecutor;
    use crate::types::StatusColor;
    use chrono::NaiveDate;
    use dealdesk_core::{SchedulerConfig, SchedulerError};
    use reqwest::header::AUTHORIZATION;
    use std::time::Duration;
    use tokio::time::Instant;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn client_with(mock: Arc<MockExecutor>, config: SchedulerConfig) -> AmoCrmClient {
        let scheduler = RequestScheduler::new(config).unwrap();
        AmoCrmClient::with_executor(mock, "test-token", scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_deals_with_contacts() {
        let mock = Arc::new(MockExecutor::with_today(today()));
        let client = client_with(mock.clone(), SchedulerConfig::default());

        let deals = client.get_deals(true).await.unwrap();
        assert_eq!(deals.len(), 6);
        assert_eq!(deals[0].contact_name(), "Contact 1");
        assert_eq!(deals[1].contact_phone(), "+79045678901");
        assert_eq!(deals[3].contact_name(), "N/A");
        assert_eq!(deals[2].status(today()), StatusColor::Green);

        // One listing plus one lookup per deal with a contact
        let requests = mock.requests();
        assert_eq!(requests.len(), 6);
        assert_eq!(requests[0].path, "/leads?with=contacts");
        assert!(requests
            .iter()
            .all(|r| r.headers[AUTHORIZATION] == "Bearer test-token"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_deals_without_contacts() {
        let mock = Arc::new(MockExecutor::with_today(today()));
        let client = client_with(mock.clone(), SchedulerConfig::default());

        let deals = client.get_deals(false).await.unwrap();
        assert!(deals.iter().all(|d| d.contact.is_none()));
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_rate_limited() {
        let mock = Arc::new(MockExecutor::with_today(today()).with_latency(Duration::from_millis(50)));
        let client = client_with(mock.clone(), SchedulerConfig::default());
        let t0 = Instant::now();

        client.get_deals(true).await.unwrap();

        assert!(mock.peak_in_flight() <= 2);
        // Six calls, two slots, one second per slot: the last wave starts at 2s
        assert!(Instant::now() - t0 >= Duration::from_millis(2000));
        assert_eq!(client.scheduler().metrics().snapshot().succeeded, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_contact_fails_listing() {
        let mock = Arc::new(MockExecutor::with_today(today()));
        mock.fail_path("/contacts/103", 500);
        let client = client_with(mock, SchedulerConfig::default().with_min_spacing(Duration::ZERO));

        let err = client.get_deals(true).await.unwrap_err();
        assert!(matches!(err, CrmError::Status { status: 500, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deal_details() {
        let mock = Arc::new(MockExecutor::with_today(today()));
        let client = client_with(mock.clone(), SchedulerConfig::default());

        let deal = client.get_deal_details(4).await.unwrap();
        assert_eq!(deal.name, "Deal 4");
        assert_eq!(deal.budget, 12500);
        assert_eq!(deal.status(today()), StatusColor::Yellow);
        assert_eq!(mock.requests()[0].path, "/leads/4?with=tasks");

        let missing = client.get_deal_details(42).await.unwrap_err();
        assert_eq!(missing.status_code(), Some(404));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_surfaces_as_scheduler_error() {
        let mock = Arc::new(MockExecutor::with_today(today()));
        let client = client_with(mock.clone(), SchedulerConfig::default());
        client.scheduler().shutdown();
        tokio::time::sleep(Duration::from_millis(1)).await;

        let err = client.get_contact(101).await.unwrap_err();
        assert!(matches!(err, CrmError::Scheduler(SchedulerError::Shutdown)));
        assert!(mock.requests().is_empty());
    }
}
