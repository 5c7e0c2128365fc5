//! amoCRM connection settings.

use std::time::Duration;

/// Default API root used when `AMOCRM_BASE_URL` is not set
pub const DEFAULT_BASE_URL: &str = "https://example.amocrm.ru/api/v4";

/// Connection settings for the amoCRM API
#[derive(Clone, PartialEq, Eq)]
pub struct AmoCrmConfig {
    /// API root, without a trailing slash
    pub base_url: String,

    /// OAuth access token sent as `Authorization: Bearer ...`
    pub access_token: String,

    /// Per-request timeout for the HTTP executor
    pub request_timeout: Duration,
}

impl Default for AmoCrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl AmoCrmConfig {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    /// Read settings from `AMOCRM_BASE_URL` and `AMOCRM_ACCESS_TOKEN`
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("AMOCRM_BASE_URL").filter(|s| !s.trim().is_empty()) {
            config.base_url = trim_base_url(url);
        }
        if let Some(token) = lookup("AMOCRM_ACCESS_TOKEN") {
            config.access_token = token.trim().to_string();
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn has_token(&self) -> bool {
        !self.access_token.is_empty()
    }
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

impl std::fmt::Debug for AmoCrmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = if self.has_token() { "<redacted>" } else { "<unset>" };
        f.debug_struct("AmoCrmConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &token)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AmoCrmConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(!config.has_token());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_vars() {
        let config = AmoCrmConfig::from_vars(|key| match key {
            "AMOCRM_BASE_URL" => Some("https://acme.amocrm.ru/api/v4/".to_string()),
            "AMOCRM_ACCESS_TOKEN" => Some("secret-token\n".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url, "https://acme.amocrm.ru/api/v4");
        assert_eq!(config.access_token, "secret-token");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = AmoCrmConfig::new("http://localhost", "secret-token");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }
}
