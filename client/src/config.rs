//! Connection settings for the HTTP booking service.
//!
//! Loaded from environment variables with defaults suitable for local
//! development.

use std::env;
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the booking API, without trailing slash
    pub base_url: String,
    /// Bearer token sent with every request
    pub api_key: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// - `BOOKING_API_URL` (default `http://localhost:8080/api`)
    /// - `BOOKING_API_KEY` (optional)
    /// - `BOOKING_REQUEST_TIMEOUT_SECS` (default 15)
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("BOOKING_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:8080/api".to_string()),
            api_key: env::var("BOOKING_API_KEY").ok().filter(|key| !key.is_empty()),
            request_timeout: Duration::from_secs(
                env::var("BOOKING_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(15),
            ),
        }
    }

    /// Configuration pointing at an explicit base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Set the bearer token
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(15),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_strips_trailing_slash() {
        let config = ClientConfig::new("https://bookings.example.com/api/")
            .with_api_key("secret")
            .with_request_timeout(Duration::from_secs(3));

        assert_eq!(config.base_url, "https://bookings.example.com/api");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }
}
