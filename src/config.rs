//! Client configuration.
//!
//! Configuration via environment variables (the CLI flags fall back to these):
//! - `PT_API_URL` (default: `http://localhost:8000`)
//! - `PT_CSRF_TOKEN` (optional, sent as `X-CSRFToken` on mutating requests)
//! - `PT_TIMEOUT_SECS` (default: `30`)

use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for [`crate::api::HttpApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub csrf_token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_API_URL.to_string(),
            csrf_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_csrf_token(mut self, token: Option<String>) -> Self {
        self.csrf_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a configuration from `PT_*` environment variables.
    pub fn from_env() -> Self {
        let base_url = std::env::var("PT_API_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout_secs = std::env::var("PT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        ClientConfig::new(base_url)
            .with_csrf_token(std::env::var("PT_CSRF_TOKEN").ok())
            .with_timeout(Duration::from_secs(timeout_secs))
    }

    /// Base URL without a trailing slash, ready to have `/api/...` appended.
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_api_root() {
        let cfg = ClientConfig::new("https://tracker.example.org/")
            .with_csrf_token(Some(String::new()))
            .with_timeout(Duration::from_secs(5));
        assert_eq!(cfg.api_root(), "https://tracker.example.org");
        assert_eq!(cfg.csrf_token, None);
        assert_eq!(cfg.timeout, Duration::from_secs(5));
    }
}
