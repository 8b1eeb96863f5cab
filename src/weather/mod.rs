//! Weather provider capability and the HTTP plumbing shared by the adapters

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::models::ProviderReport;
use crate::{Result, WeatherCompareError};

pub mod noaa;
pub mod openweather;
pub mod weatherapi;

pub use noaa::NoaaProvider;
pub use openweather::OpenWeatherProvider;
pub use weatherapi::WeatherApiProvider;

/// Bound applied to a provider call when it does not name its own
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Forecast entries kept per provider
pub const MAX_FORECAST_POINTS: usize = 24;

/// Capability every weather provider implements.
///
/// The registry holds providers as `Arc<dyn WeatherProvider>` keyed by
/// [`WeatherProvider::id`] and never sees the concrete adapter types.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Stable identifier such as "noaa" or "openweather"
    fn id(&self) -> &'static str;

    /// Human readable name used in logs and error messages
    fn display_name(&self) -> &'static str;

    /// Whether the provider has everything it needs to make a request.
    ///
    /// Checked before any network I/O; an unconfigured provider is never called.
    fn is_configured(&self) -> bool;

    /// Upper bound on a whole [`WeatherProvider::fetch_weather`] call
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Fetch current conditions and forecast, normalized to canonical units
    async fn fetch_weather(&self, latitude: f64, longitude: f64) -> Result<ProviderReport>;
}

/// Error bodies seen across the upstreams: `{message}`, `{error: {message}}`, `{detail}`
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<ErrorDetail>,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error
            .and_then(|e| e.message)
            .or(self.message)
            .or(self.detail)
            .filter(|m| !m.trim().is_empty())
    }
}

/// Describe a non-2xx upstream response
pub(crate) fn describe_status(status: StatusCode, body: &[u8]) -> String {
    let status_text = status.canonical_reason().unwrap_or("Unknown error");
    let upstream_message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message);

    let is_key_problem = status == StatusCode::UNAUTHORIZED
        || upstream_message
            .as_deref()
            .is_some_and(|m| m.contains("API key"));

    match (is_key_problem, upstream_message) {
        (true, Some(message)) => format!("Invalid API key - {message}"),
        (true, None) => "Invalid API key".to_string(),
        (false, Some(message)) => format!("{status_text} - {message}"),
        (false, None) => status_text.to_string(),
    }
}

/// Send one request bounded by `timeout` and decode its JSON body as `T`
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: RequestBuilder,
    provider: &str,
    timeout: Duration,
) -> Result<T> {
    let map_transport = |e: reqwest::Error| {
        if e.is_timeout() {
            WeatherCompareError::timeout(provider, timeout)
        } else {
            WeatherCompareError::upstream(provider, format!("request failed: {e}"))
        }
    };

    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(map_transport)?;

    let status = response.status();
    let body = response.bytes().await.map_err(map_transport)?;

    if !status.is_success() {
        tracing::debug!(provider, status = status.as_u16(), "upstream returned an error status");
        return Err(WeatherCompareError::upstream(
            provider,
            describe_status(status, &body),
        ));
    }

    serde_json::from_slice(&body).map_err(|e| {
        WeatherCompareError::upstream(provider, format!("malformed payload: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_status_plain() {
        assert_eq!(describe_status(StatusCode::NOT_FOUND, b""), "Not Found");
        assert_eq!(
            describe_status(StatusCode::BAD_GATEWAY, br#"{"message":"upstream down"}"#),
            "Bad Gateway - upstream down"
        );
    }

    #[test]
    fn test_describe_status_nested_error() {
        let body = br#"{"error":{"code":1006,"message":"No matching location found."}}"#;
        assert_eq!(
            describe_status(StatusCode::BAD_REQUEST, body),
            "Bad Request - No matching location found."
        );
    }

    #[test]
    fn test_describe_status_invalid_key() {
        assert_eq!(
            describe_status(StatusCode::UNAUTHORIZED, br#"{"cod":401}"#),
            "Invalid API key"
        );

        let body = br#"{"error":{"code":2008,"message":"API key has been disabled."}}"#;
        assert_eq!(
            describe_status(StatusCode::FORBIDDEN, body),
            "Invalid API key - API key has been disabled."
        );
    }
}
