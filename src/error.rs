//! Error types and handling for the weather comparison engine

use thiserror::Error;

use crate::models::ProviderFailure;

/// Main error type for the weather comparison engine
#[derive(Error, Debug)]
pub enum WeatherCompareError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A provider was asked to fetch without its credential
    #[error("Provider '{provider}' is not configured")]
    NotConfigured { provider: String },

    /// A provider id that the registry does not know
    #[error("Provider '{provider}' is not registered")]
    NotRegistered { provider: String },

    /// Non-2xx response or malformed payload from an upstream provider
    #[error("{provider} API error: {message}")]
    Upstream { provider: String, message: String },

    /// The bounded wait on an upstream provider elapsed
    #[error("{provider} API error: request timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Every eligible provider failed
    #[error("All weather providers failed ({} failures)", failures.len())]
    AllProvidersFailed { failures: Vec<ProviderFailure> },

    /// Persistence service errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// A referenced row does not exist
    #[error("Not found: {message}")]
    NotFound { message: String },
}

impl WeatherCompareError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new not-configured error for a provider
    pub fn not_configured<S: Into<String>>(provider: S) -> Self {
        Self::NotConfigured {
            provider: provider.into(),
        }
    }

    /// Create a new upstream error for a provider
    pub fn upstream<P: Into<String>, S: Into<String>>(provider: P, message: S) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error for a provider
    pub fn timeout<P: Into<String>>(provider: P, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            provider: provider.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Timeouts are upstream errors triggered by the bounded wait
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the error came from an upstream provider (including timeouts)
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. })
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            Self::NotConfigured { provider } => {
                format!("{provider} is not configured. Set its API key to enable it.")
            }
            Self::NotRegistered { provider } => format!("Unknown weather provider '{provider}'"),
            Self::Upstream { .. } | Self::Timeout { .. } => {
                "Unable to reach the weather provider. Please try again later.".to_string()
            }
            Self::Validation { message } => format!("Invalid input: {message}"),
            Self::AllProvidersFailed { .. } => "All weather services failed".to_string(),
            Self::Storage { .. } => "Failed to access stored weather data".to_string(),
            Self::NotFound { message } => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureKind;
    use std::time::Duration;

    #[test]
    fn test_error_creation() {
        let config_err = WeatherCompareError::config("missing base url");
        assert!(matches!(config_err, WeatherCompareError::Config { .. }));

        let upstream_err = WeatherCompareError::upstream("NOAA", "Not Found");
        assert!(upstream_err.is_upstream());
        assert!(!upstream_err.is_timeout());
        assert_eq!(upstream_err.to_string(), "NOAA API error: Not Found");

        let validation_err = WeatherCompareError::validation("invalid coordinates");
        assert!(matches!(validation_err, WeatherCompareError::Validation { .. }));
    }

    #[test]
    fn test_timeout_is_upstream() {
        let err = WeatherCompareError::timeout("WeatherAPI", Duration::from_secs(10));
        assert!(err.is_timeout());
        assert!(err.is_upstream());
        assert!(err.to_string().contains("10000ms"));
    }

    #[test]
    fn test_user_messages() {
        let validation_err = WeatherCompareError::validation("latitude out of range");
        assert!(validation_err.user_message().contains("latitude out of range"));

        let all_failed = WeatherCompareError::AllProvidersFailed {
            failures: vec![ProviderFailure::new(
                "noaa",
                FailureKind::Upstream,
                "NOAA API error: Bad Gateway",
            )],
        };
        assert_eq!(all_failed.user_message(), "All weather services failed");
        assert!(all_failed.to_string().contains("1 failures"));
    }
}
