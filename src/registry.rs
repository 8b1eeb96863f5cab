//! Provider registry for fanning one query out to every weather provider.
//!
//! The registry holds providers behind the [`WeatherProvider`] capability and:
//! - runs every eligible provider concurrently, each under its own time bound
//! - captures each provider's error as a failure result instead of raising it
//! - waits for every call to settle before returning

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::ProvidersConfig;
use crate::models::{
    Comparison, ProviderFailure, ProviderReport, ProviderResult, ProviderStatus,
    validate_coordinates,
};
use crate::weather::{NoaaProvider, OpenWeatherProvider, WeatherApiProvider, WeatherProvider};
use crate::{Result, WeatherCompareError};

/// Registry of weather providers keyed by [`WeatherProvider::id`].
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn WeatherProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the standard NOAA, OpenWeatherMap and WeatherAPI.com providers
    /// around one shared HTTP client.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let client = Client::builder().build().map_err(|e| {
            WeatherCompareError::config(format!("Failed to build HTTP client: {e}"))
        })?;

        let providers: [Arc<dyn WeatherProvider>; 3] = [
            Arc::new(NoaaProvider::new(client.clone(), &config.noaa)),
            Arc::new(OpenWeatherProvider::new(client.clone(), &config.openweather)),
            Arc::new(WeatherApiProvider::new(client, &config.weatherapi)),
        ];

        let mut registry = Self::new();
        registry.register_all(providers);
        Ok(registry)
    }

    /// Register a provider, replacing any provider with the same id.
    pub fn register(&mut self, provider: Arc<dyn WeatherProvider>) {
        match self.providers.iter_mut().find(|p| p.id() == provider.id()) {
            Some(existing) => {
                debug!(provider = provider.id(), "replacing registered provider");
                *existing = provider;
            }
            None => self.providers.push(provider),
        }
    }

    pub fn register_all<I>(&mut self, providers: I)
    where
        I: IntoIterator<Item = Arc<dyn WeatherProvider>>,
    {
        for provider in providers {
            self.register(provider);
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn WeatherProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.providers.iter().any(|p| p.id() == id)
    }

    /// Remove a provider; returns whether it was registered.
    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.providers.len();
        self.providers.retain(|p| p.id() != id);
        self.providers.len() != before
    }

    pub fn clear(&mut self) {
        self.providers.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Ids of all registered providers, in registration order.
    #[must_use]
    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Providers that can be called without a missing credential.
    #[must_use]
    pub fn configured(&self) -> Vec<Arc<dyn WeatherProvider>> {
        self.providers
            .iter()
            .filter(|p| p.is_configured())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<ProviderStatus> {
        self.providers
            .iter()
            .map(|p| ProviderStatus {
                id: p.id().to_string(),
                display_name: p.display_name().to_string(),
                configured: p.is_configured(),
            })
            .collect()
    }

    /// Emit one structured event per registered provider.
    pub fn log_configuration_status(&self) {
        for provider in &self.providers {
            if provider.is_configured() {
                info!(
                    provider = provider.id(),
                    display_name = provider.display_name(),
                    configured = true,
                    "weather provider ready"
                );
            } else {
                warn!(
                    provider = provider.id(),
                    display_name = provider.display_name(),
                    configured = false,
                    "weather provider not configured; it will be skipped"
                );
            }
        }
    }

    /// Fetch from a single provider by id. Never fails: every error becomes a
    /// failure result.
    pub async fn fetch_from(&self, id: &str, latitude: f64, longitude: f64) -> ProviderResult {
        match self.get(id) {
            Some(provider) => fetch_bounded(provider.as_ref(), latitude, longitude).await,
            None => {
                let error = WeatherCompareError::NotRegistered {
                    provider: id.to_string(),
                };
                ProviderResult::Failure(ProviderFailure::from_error(id, &error))
            }
        }
    }

    /// Fetch from every eligible provider concurrently.
    ///
    /// Returns one result per eligible provider, after all of them settle.
    #[tracing::instrument(name = "fetch_all", skip(self))]
    pub async fn fetch_all(
        &self,
        latitude: f64,
        longitude: f64,
        only_configured: bool,
    ) -> Vec<ProviderResult> {
        let eligible: Vec<_> = if only_configured {
            self.configured()
        } else {
            self.providers.clone()
        };

        let started = Instant::now();
        let results = join_all(
            eligible
                .iter()
                .map(|provider| fetch_bounded(provider.as_ref(), latitude, longitude)),
        )
        .await;

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(
            providers = results.len(),
            succeeded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "provider fan-out settled"
        );
        results
    }

    /// Successful reports from every configured provider.
    pub async fn fetch_successful(&self, latitude: f64, longitude: f64) -> Vec<ProviderReport> {
        self.fetch_all(latitude, longitude, true)
            .await
            .into_iter()
            .filter_map(ProviderResult::success)
            .collect()
    }

    /// Validate coordinates, fetch from all configured providers and collect
    /// the comparison. Fails only on invalid input or when nothing succeeded.
    pub async fn compare(&self, latitude: f64, longitude: f64) -> Result<Comparison> {
        validate_coordinates(latitude, longitude)?;

        let results = self.fetch_all(latitude, longitude, true).await;
        let comparison = Comparison::from_results(results);

        match &comparison {
            Ok(c) => {
                for failure in &c.failures {
                    warn!(
                        provider = %failure.provider_id,
                        error = %failure.error_message,
                        "provider failed during comparison"
                    );
                }
            }
            Err(e) => warn!(latitude, longitude, error = %e, "no provider returned data"),
        }
        comparison
    }
}

/// Run one provider call under its own time bound, capturing any error
async fn fetch_bounded(
    provider: &dyn WeatherProvider,
    latitude: f64,
    longitude: f64,
) -> ProviderResult {
    let id = provider.id();

    if !provider.is_configured() {
        let error = WeatherCompareError::not_configured(id);
        return ProviderResult::Failure(ProviderFailure::from_error(id, &error));
    }

    let timeout = provider.timeout();
    let started = tokio::time::Instant::now();
    let outcome = tokio::time::timeout(timeout, provider.fetch_weather(latitude, longitude))
        .await
        .unwrap_or_else(|_| Err(WeatherCompareError::timeout(provider.display_name(), timeout)));
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(report) => {
            debug!(provider = id, elapsed_ms, "provider fetch succeeded");
            ProviderResult::Success(report)
        }
        Err(error) => {
            warn!(provider = id, elapsed_ms, error = %error, "provider fetch failed");
            ProviderResult::Failure(ProviderFailure::from_error(id, &error))
        }
    }
}
