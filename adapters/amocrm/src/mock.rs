//! In-memory amoCRM stand-in.
//!
//! Serves a fixed set of sample deals with task due dates relative to
//! "today", so the deals table shows every status colour. Latency and
//! per-route failures can be injected to exercise the scheduler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::error::CrmError;
use crate::executor::{RemoteExecutor, RequestDescriptor};
use crate::types::{Contact, ContactRef, Deal, DealTask};

/// Mock executor answering the routes the client uses
#[derive(Debug)]
pub struct MockExecutor {
    deals: Vec<Deal>,
    contacts: HashMap<u64, Contact>,
    latency: Duration,
    failures: Mutex<HashMap<String, u16>>,
    requests: Mutex<Vec<RequestDescriptor>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    /// Sample data anchored to the local date
    pub fn new() -> Self {
        Self::with_today(Local::now().date_naive())
    }

    /// Sample data anchored to `today`
    pub fn with_today(today: NaiveDate) -> Self {
        let (deals, contacts) = sample_data(today);
        Self {
            deals,
            contacts: contacts.into_iter().map(|c| (c.id, c)).collect(),
            latency: Duration::ZERO,
            failures: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make `route` (path without query) answer with `status`
    pub fn fail_path(&self, route: impl Into<String>, status: u16) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(route.into(), status);
        }
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Most requests observed executing at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    fn respond(&self, request: &RequestDescriptor) -> Result<Value, CrmError> {
        let route = request.route();

        let injected = self
            .failures
            .lock()
            .ok()
            .and_then(|failures| failures.get(route).copied());
        if let Some(status) = injected {
            return Err(CrmError::status(status, "injected failure"));
        }

        if request.method != Method::GET {
            return Err(CrmError::status(405, "Method Not Allowed"));
        }

        let segments: Vec<&str> = route.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            ["leads"] => Ok(serde_json::to_value(&self.deals)?),
            ["leads", id] => {
                let deal = id
                    .parse::<u64>()
                    .ok()
                    .and_then(|id| self.deals.iter().find(|d| d.id == id))
                    .ok_or_else(|| CrmError::status(404, "Not Found"))?;
                Ok(serde_json::to_value(deal)?)
            }
            ["contacts", id] => {
                let contact = id
                    .parse::<u64>()
                    .ok()
                    .and_then(|id| self.contacts.get(&id))
                    .ok_or_else(|| CrmError::status(404, "Not Found"))?;
                Ok(serde_json::to_value(contact)?)
            }
            _ => Err(CrmError::status(404, "Not Found")),
        }
    }
}

#[async_trait]
impl RemoteExecutor for MockExecutor {
    async fn execute(&self, request: RequestDescriptor) -> Result<Value, CrmError> {
        debug!(method = %request.method, path = %request.path, "Mock request");
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = self.respond(&request);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn sample_data(today: NaiveDate) -> (Vec<Deal>, Vec<Contact>) {
    let contacts = vec![
        contact(101, "Contact 1", "+79854567890"),
        contact(102, "Contact 2", "+79045678901"),
        contact(103, "Contact 3", "+2345678901"),
        contact(105, "Contact 3", "+2340028910"),
        contact(106, "Contact 3", "+2341096458"),
    ];

    let deals = vec![
        deal(1, 1000, Some(101), offset(today, -2), "completed"),
        deal(2, 2000, Some(102), offset(today, -1), "completed"),
        deal(3, 2500, Some(103), today, "in_progress"),
        deal(4, 12500, None, offset(today, 1), "in_progress"),
        deal(5, 9000, Some(105), offset(today, 2), "in_progress"),
        deal(6, 1500, Some(106), offset(today, -1), "completed"),
    ];

    (deals, contacts)
}

fn offset(today: NaiveDate, days: i64) -> NaiveDate {
    let shifted = if days >= 0 {
        today.checked_add_days(Days::new(days as u64))
    } else {
        today.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.unwrap_or(today)
}

fn contact(id: u64, name: &str, phone: &str) -> Contact {
    Contact {
        id,
        name: Some(name.to_string()),
        phone: Some(phone.to_string()),
    }
}

fn deal(id: u64, budget: u64, contact_id: Option<u64>, due_date: NaiveDate, status: &str) -> Deal {
    Deal {
        id,
        name: format!("Deal {}", id),
        budget,
        contacts: contact_id.map(|id| ContactRef { id }).into_iter().collect(),
        contact: None,
        tasks: vec![DealTask {
            due_date,
            status: status.to_string(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_deals, StatusColor};
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_sample_deals_cover_every_status() {
        let mock = MockExecutor::with_today(today());
        let colors: Vec<StatusColor> = mock.deals().iter().map(|d| d.status(today())).collect();
        assert_eq!(
            colors,
            vec![
                StatusColor::Red,
                StatusColor::Red,
                StatusColor::Green,
                StatusColor::Yellow,
                StatusColor::Yellow,
                StatusColor::Red,
            ]
        );
    }

    #[test]
    fn test_offset_crosses_month_boundary() {
        assert_eq!(
            offset(today(), -2),
            NaiveDate::from_ymd_opt(2024, 2, 28).unwrap()
        );
    }

    #[tokio::test]
    async fn test_routes() {
        let mock = MockExecutor::with_today(today());

        let listing = mock
            .execute(RequestDescriptor::get("/leads?with=contacts"))
            .await
            .unwrap();
        assert_eq!(parse_deals(listing).unwrap().len(), 6);

        let contact = mock
            .execute(RequestDescriptor::get("/contacts/102"))
            .await
            .unwrap();
        assert_eq!(contact["phone"], "+79045678901");

        let details = mock
            .execute(RequestDescriptor::get("/leads/3?with=tasks"))
            .await
            .unwrap();
        assert_eq!(details["tasks"][0]["status"], "in_progress");

        let missing = mock
            .execute(RequestDescriptor::get("/leads/99"))
            .await
            .unwrap_err();
        assert_eq!(missing.status_code(), Some(404));

        assert_eq!(mock.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let mock = MockExecutor::with_today(today());
        mock.fail_path("/contacts/103", 500);

        let err = mock
            .execute(RequestDescriptor::get("/contacts/103"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(mock
            .execute(RequestDescriptor::get("/contacts/101"))
            .await
            .is_ok());
    }

    #[test]
    fn test_embedded_listing_parses() {
        let mock = MockExecutor::with_today(today());
        let envelope = json!({ "_embedded": { "leads": mock.deals() } });
        let deals = parse_deals(envelope).unwrap();
        assert_eq!(deals, mock.deals());
    }
}
