//! Error types for the remote booking service

use thiserror::Error;

/// Errors returned by a [`BookingService`](crate::BookingService)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Transport failure (connection refused, reset, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// The device has no connectivity
    #[error("No internet connection")]
    Offline,

    /// The service answered with a 5xx status
    #[error("Service error (status {status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Body returned by the service
        message: String,
    },

    /// The service refused the request (validation or processing failure)
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The response body could not be decoded
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// The configured service URL cannot carry request paths
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),
}

impl ServiceError {
    /// Whether an immediate automatic retry may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::Offline => true,
            Self::Server { status, .. } => *status >= 500,
            Self::Rejected(_) | Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }

    /// Message suitable for an error banner
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) | Self::Server { .. } | Self::Decode(_) | Self::InvalidUrl(_) => {
                "We couldn't reach the booking service. Please try again.".to_string()
            },
            Self::Timeout => "The booking service took too long to respond. Please try again.".to_string(),
            Self::Offline => {
                "No internet connection. We'll retry automatically when you're back online.".to_string()
            },
            Self::Rejected(reason) => format!("Your request could not be completed: {reason}"),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Result alias for booking service calls
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ServiceError::Network("reset".to_string()).is_transient());
        assert!(ServiceError::Timeout.is_transient());
        assert!(ServiceError::Offline.is_transient());
        assert!(
            ServiceError::Server {
                status: 503,
                message: "unavailable".to_string()
            }
            .is_transient()
        );
        assert!(!ServiceError::Rejected("slot taken".to_string()).is_transient());
        assert!(!ServiceError::Decode("bad json".to_string()).is_transient());
        assert!(!ServiceError::InvalidUrl("mailto:bookings".to_string()).is_transient());
    }

    #[test]
    fn rejected_message_includes_reason() {
        let message = ServiceError::Rejected("slot already booked".to_string()).user_message();
        assert!(message.ends_with("slot already booked"));
    }
}
