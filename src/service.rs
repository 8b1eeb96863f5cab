//! Ingest path shared by the HTTP handlers
//!
//! Wraps the registry, the store and the accuracy engine so handlers only
//! translate requests and responses.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::accuracy::AccuracyEngine;
use crate::models::{
    Comparison, Location, NewForecast, NewLocation, NewObservation, ProviderAccuracy,
    ProviderReport, ProviderStatus, RowId, StoredForecast, StoredLocation, StoredObservation,
    WeatherObservation, validate_coordinates,
};
use crate::registry::ProviderRegistry;
use crate::store::{WeatherStore, generate_session_id};
use crate::{Result, WeatherCompareError};

/// A comparison plus the location row it was stored under, if any
#[derive(Debug, Clone)]
pub struct CompareOutcome {
    pub comparison: Comparison,
    pub location_id: Option<RowId>,
}

pub struct ComparisonService {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn WeatherStore>,
    accuracy: AccuracyEngine,
}

impl ComparisonService {
    pub fn new(registry: Arc<ProviderRegistry>, store: Arc<dyn WeatherStore>) -> Self {
        let accuracy = AccuracyEngine::new(Arc::clone(&store));
        Self {
            registry,
            store,
            accuracy,
        }
    }

    #[must_use]
    pub fn provider_statuses(&self) -> Vec<ProviderStatus> {
        self.registry.statuses()
    }

    /// Compare every configured provider at a coordinate.
    ///
    /// With a session key the successful reports are stored: each current
    /// reading as an observation and each forecast point as a forecast of its
    /// provider, under the session's location row for these coordinates.
    /// Rows already stored for the same provider and instant are skipped, so
    /// repeating a compare never weights one forecast twice.
    #[tracing::instrument(name = "service_compare", skip(self))]
    pub async fn compare(
        &self,
        latitude: f64,
        longitude: f64,
        session_id: Option<&str>,
    ) -> Result<CompareOutcome> {
        let comparison = self.registry.compare(latitude, longitude).await?;

        let location_id = match session_id {
            Some(session_id) => {
                let location = Location {
                    latitude,
                    longitude,
                    ..comparison.location.clone()
                };
                let stored = self.find_or_create_location(session_id, location).await?;
                let mut seen = StoredRows::load(self.store.as_ref(), stored.id).await?;
                for report in &comparison.reports {
                    self.persist_report(stored.id, report, &mut seen).await?;
                }
                Some(stored.id)
            }
            None => None,
        };

        Ok(CompareOutcome {
            comparison,
            location_id,
        })
    }

    /// Store a location; callers without a session key get a fresh one
    pub async fn register_location(
        &self,
        latitude: f64,
        longitude: f64,
        session_id: Option<String>,
    ) -> Result<StoredLocation> {
        validate_coordinates(latitude, longitude)?;
        let session_id = session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(generate_session_id);

        let stored = self
            .store
            .insert_location(NewLocation {
                session_id,
                location: Location::new(latitude, longitude),
            })
            .await?;
        info!(location_id = stored.id, "Location registered");
        Ok(stored)
    }

    pub async fn record_forecast(&self, forecast: NewForecast) -> Result<StoredForecast> {
        if !self.registry.has(&forecast.provider_id) {
            return Err(WeatherCompareError::validation(format!(
                "unknown weather provider '{}'",
                forecast.provider_id
            )));
        }
        self.require_location(forecast.location_id).await?;
        self.store.insert_forecast(forecast).await
    }

    pub async fn record_observation(
        &self,
        observation: NewObservation,
    ) -> Result<StoredObservation> {
        self.require_location(observation.location_id).await?;
        self.store.insert_observation(observation).await
    }

    /// Score pending pairs for a location, then list all of its metrics
    pub async fn accuracy(&self, location_id: RowId) -> Result<Vec<ProviderAccuracy>> {
        self.accuracy.evaluate(location_id).await
    }

    async fn require_location(&self, location_id: RowId) -> Result<StoredLocation> {
        self.store
            .get_location(location_id)
            .await?
            .ok_or_else(|| {
                WeatherCompareError::not_found(format!("Location {location_id} does not exist"))
            })
    }

    async fn find_or_create_location(
        &self,
        session_id: &str,
        location: Location,
    ) -> Result<StoredLocation> {
        if let Some(existing) = self
            .store
            .find_location_by_coordinates(location.latitude, location.longitude, Some(session_id))
            .await?
        {
            return Ok(existing);
        }

        let name = location.display_name();
        let stored = self
            .store
            .insert_location(NewLocation {
                session_id: session_id.to_string(),
                location,
            })
            .await?;
        info!(location_id = stored.id, location = %name, "Location created for session");
        Ok(stored)
    }

    async fn persist_report(
        &self,
        location_id: RowId,
        report: &ProviderReport,
        seen: &mut StoredRows,
    ) -> Result<()> {
        let mut stored_forecasts = 0;
        if seen.has_observation(&report.current) {
            debug!(location_id, provider = %report.provider_id, "Observation already stored");
        } else {
            let row = self
                .store
                .insert_observation(NewObservation {
                    location_id,
                    observation: report.current.clone(),
                    observed_timestamp: report.current.timestamp,
                })
                .await?;
            seen.observations.push(row);
        }

        for point in &report.forecast {
            if seen.has_forecast(&report.provider_id, point.timestamp()) {
                continue;
            }
            let row = self
                .store
                .insert_forecast(NewForecast {
                    location_id,
                    provider_id: report.provider_id.clone(),
                    forecast: point.clone(),
                    forecast_timestamp: point.timestamp(),
                })
                .await?;
            seen.forecasts.push(row);
            stored_forecasts += 1;
        }

        debug!(
            location_id,
            provider = %report.provider_id,
            forecasts = stored_forecasts,
            skipped = report.forecast.len() - stored_forecasts,
            "Stored provider report"
        );
        Ok(())
    }
}

/// Rows already stored under one location, used to skip duplicates
struct StoredRows {
    forecasts: Vec<StoredForecast>,
    observations: Vec<StoredObservation>,
}

impl StoredRows {
    async fn load(store: &dyn WeatherStore, location_id: RowId) -> Result<Self> {
        let (forecasts, observations) = tokio::try_join!(
            store.list_forecasts_by_location(location_id),
            store.list_observations_by_location(location_id),
        )?;
        Ok(Self {
            forecasts,
            observations,
        })
    }

    fn has_forecast(&self, provider_id: &str, timestamp: DateTime<Utc>) -> bool {
        self.forecasts
            .iter()
            .any(|f| f.provider_id == provider_id && f.forecast_timestamp == timestamp)
    }

    /// Observations carry no provider id; the reading itself identifies its source
    fn has_observation(&self, current: &WeatherObservation) -> bool {
        self.observations
            .iter()
            .any(|o| o.observed_timestamp == current.timestamp && o.observation == *current)
    }
}
