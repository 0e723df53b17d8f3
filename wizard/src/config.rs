//! Configuration management for the booking wizard.
//!
//! Loads configuration from environment variables with sensible defaults.

use booking_client::ClientConfig;
use booking_runtime::retry::RetryPolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is set but cannot be parsed
    #[error("Invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },
}

/// Wizard configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WizardConfig {
    /// Remote booking service connection
    pub client: ClientConfig,
    /// Currency for payment intents, lowercase ISO code
    pub currency: String,
    /// Automatic retry for transient remote failures
    pub retry_policy: RetryPolicy,
    /// Pause between coming back online and replaying held requests
    pub reconnect_delay: Duration,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            currency: "usd".to_string(),
            retry_policy: RetryPolicy::default(),
            reconnect_delay: Duration::from_millis(500),
        }
    }
}

impl WizardConfig {
    /// Load configuration from environment variables
    ///
    /// - `BOOKING_CURRENCY` (default `usd`)
    /// - `BOOKING_RETRY_MAX` (default 2)
    /// - `BOOKING_RETRY_INITIAL_DELAY_MS` (default 200)
    /// - `BOOKING_RETRY_MAX_DELAY_MS` (default 5000)
    /// - `BOOKING_RECONNECT_DELAY_MS` (default 500)
    ///
    /// plus the client variables read by [`ClientConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let retry_policy = RetryPolicy::builder()
            .max_retries(parse_var("BOOKING_RETRY_MAX", 2)?)
            .initial_delay(Duration::from_millis(parse_var(
                "BOOKING_RETRY_INITIAL_DELAY_MS",
                200,
            )?))
            .max_delay(Duration::from_millis(parse_var(
                "BOOKING_RETRY_MAX_DELAY_MS",
                5000,
            )?))
            .build();

        Ok(Self {
            client: ClientConfig::from_env(),
            currency: env::var("BOOKING_CURRENCY")
                .map(|c| c.trim().to_lowercase())
                .ok()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "usd".to_string()),
            retry_policy,
            reconnect_delay: Duration::from_millis(parse_var("BOOKING_RECONNECT_DELAY_MS", 500)?),
        })
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the reconnect delay
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the payment currency
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    parse_value(key, env::var(key).ok(), default)
}

fn parse_value<T: FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_uses_default() {
        assert_eq!(parse_var::<u64>("BOOKING_TEST_UNSET_VARIABLE", 42), Ok(42));
    }

    #[test]
    fn padded_number_parses() {
        let value = parse_value::<u32>("BOOKING_RETRY_MAX", Some(" 5 ".to_string()), 2);
        assert_eq!(value, Ok(5));
    }

    #[test]
    fn invalid_number_is_reported_with_key() {
        let error =
            parse_value::<u64>("BOOKING_RECONNECT_DELAY_MS", Some("soon".to_string()), 1).unwrap_err();
        assert_eq!(
            error,
            ConfigError::Invalid {
                key: "BOOKING_RECONNECT_DELAY_MS",
                value: "soon".to_string(),
            }
        );
        assert_eq!(
            error.to_string(),
            "Invalid value for BOOKING_RECONNECT_DELAY_MS: \"soon\""
        );
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = WizardConfig::default();
        assert_eq!(config.currency, "usd");
        assert_eq!(config.retry_policy.max_retries, 2);
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
    }
}
