//! In-process store backed by lock-protected tables

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::WeatherStore;
use crate::models::{
    AccuracyMetric, NewForecast, NewLocation, NewObservation, ProviderAccuracy, RowId,
    StoredAccuracyMetric, StoredForecast, StoredLocation, StoredObservation,
};
use crate::{Result, WeatherCompareError};

#[derive(Default)]
struct Tables {
    next_id: RowId,
    locations: Vec<StoredLocation>,
    forecasts: Vec<StoredForecast>,
    observations: Vec<StoredObservation>,
    metrics: Vec<StoredAccuracyMetric>,
}

impl Tables {
    fn allocate_id(&mut self) -> RowId {
        self.next_id += 1;
        self.next_id
    }
}

/// Volatile store; contents vanish with the process
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WeatherStore for MemoryStore {
    async fn insert_location(&self, location: NewLocation) -> Result<StoredLocation> {
        let mut tables = self.tables.write().await;
        let row = StoredLocation {
            id: tables.allocate_id(),
            session_id: location.session_id,
            location: location.location,
            created_at: Utc::now(),
        };
        tables.locations.push(row.clone());
        Ok(row)
    }

    async fn get_location(&self, id: RowId) -> Result<Option<StoredLocation>> {
        let tables = self.tables.read().await;
        Ok(tables.locations.iter().find(|l| l.id == id).cloned())
    }

    async fn find_location_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        session_id: Option<&str>,
    ) -> Result<Option<StoredLocation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .locations
            .iter()
            .filter(|l| session_id.is_none_or(|s| l.session_id == s))
            .find(|l| l.location.same_coordinates(latitude, longitude))
            .cloned())
    }

    async fn insert_forecast(&self, forecast: NewForecast) -> Result<StoredForecast> {
        let mut tables = self.tables.write().await;
        let row = StoredForecast {
            id: tables.allocate_id(),
            location_id: forecast.location_id,
            provider_id: forecast.provider_id,
            forecast: forecast.forecast,
            forecast_timestamp: forecast.forecast_timestamp,
            created_at: Utc::now(),
        };
        tables.forecasts.push(row.clone());
        Ok(row)
    }

    async fn insert_observation(&self, observation: NewObservation) -> Result<StoredObservation> {
        let mut tables = self.tables.write().await;
        let row = StoredObservation {
            id: tables.allocate_id(),
            location_id: observation.location_id,
            observation: observation.observation,
            observed_timestamp: observation.observed_timestamp,
            created_at: Utc::now(),
        };
        tables.observations.push(row.clone());
        Ok(row)
    }

    async fn list_forecasts_by_location(&self, location_id: RowId) -> Result<Vec<StoredForecast>> {
        let tables = self.tables.read().await;
        Ok(tables
            .forecasts
            .iter()
            .filter(|f| f.location_id == location_id)
            .cloned()
            .collect())
    }

    async fn list_observations_by_location(
        &self,
        location_id: RowId,
    ) -> Result<Vec<StoredObservation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .observations
            .iter()
            .filter(|o| o.location_id == location_id)
            .cloned()
            .collect())
    }

    async fn find_accuracy_metric(
        &self,
        forecast_id: RowId,
        observation_id: RowId,
    ) -> Result<Option<StoredAccuracyMetric>> {
        let tables = self.tables.read().await;
        Ok(tables
            .metrics
            .iter()
            .find(|m| {
                m.metric.forecast_id == forecast_id && m.metric.observation_id == observation_id
            })
            .cloned())
    }

    async fn insert_accuracy_metric(&self, metric: AccuracyMetric) -> Result<StoredAccuracyMetric> {
        let mut tables = self.tables.write().await;
        if !tables.forecasts.iter().any(|f| f.id == metric.forecast_id) {
            return Err(WeatherCompareError::not_found(format!(
                "Forecast {} does not exist",
                metric.forecast_id
            )));
        }

        let row = StoredAccuracyMetric {
            id: tables.allocate_id(),
            metric,
            created_at: Utc::now(),
        };
        tables.metrics.push(row.clone());
        Ok(row)
    }

    async fn list_accuracy_metrics_by_location(
        &self,
        location_id: RowId,
    ) -> Result<Vec<ProviderAccuracy>> {
        let tables = self.tables.read().await;
        Ok(tables
            .metrics
            .iter()
            .filter_map(|stored| {
                tables
                    .forecasts
                    .iter()
                    .find(|f| f.id == stored.metric.forecast_id && f.location_id == location_id)
                    .map(|forecast| ProviderAccuracy {
                        stored: stored.clone(),
                        provider_id: forecast.provider_id.clone(),
                    })
            })
            .collect())
    }
}
