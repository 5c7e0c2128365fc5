//! Remote call execution: the boundary between the scheduler and the network.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::config::AmoCrmConfig;
use crate::error::CrmError;

/// Everything needed to perform one API call
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,

    /// Path relative to the API root, including any query string
    pub path: String,

    pub body: Option<Value>,

    pub headers: HeaderMap,
}

impl RequestDescriptor {
    /// A JSON request with no body and no credentials
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            method,
            path: path.into(),
            body: None,
            headers,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    /// Attach `Authorization: Bearer <token>`
    pub fn with_bearer(mut self, token: &str) -> Result<Self, CrmError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            CrmError::Config("access token contains characters not allowed in a header".into())
        })?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// Path without the query string
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or_default()
    }
}

/// Performs a described request and returns the decoded JSON body
///
/// Errors are reported as they happened; the scheduler hands them to the
/// caller unchanged.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, request: RequestDescriptor) -> Result<Value, CrmError>;
}

/// Executor backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    base_url: String,
}

impl HttpExecutor {
    pub fn new(config: &AmoCrmConfig) -> Result<Self, CrmError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RemoteExecutor for HttpExecutor {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn execute(&self, request: RequestDescriptor) -> Result<Value, CrmError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(url = %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method, &url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!(error = %e, "Request failed");
            CrmError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = %status, body = %message, "amoCRM returned error");
            return Err(CrmError::status(status.as_u16(), message));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
