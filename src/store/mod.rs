//! Persistence contract for locations, forecasts, observations and accuracy metrics

use async_trait::async_trait;
use chrono::Utc;
use rand::RngExt;

use crate::Result;
use crate::models::{
    AccuracyMetric, NewForecast, NewLocation, NewObservation, ProviderAccuracy, RowId,
    StoredAccuracyMetric, StoredForecast, StoredLocation, StoredObservation,
};

pub mod fjall_store;
pub mod memory;

pub use fjall_store::FjallStore;
pub use memory::MemoryStore;

/// Row storage used by the ingest service and the accuracy engine.
///
/// Every failure surfaces as [`crate::WeatherCompareError::Storage`] (or
/// `NotFound` for a dangling reference), never as a domain error.
#[async_trait]
pub trait WeatherStore: Send + Sync {
    async fn insert_location(&self, location: NewLocation) -> Result<StoredLocation>;

    async fn get_location(&self, id: RowId) -> Result<Option<StoredLocation>>;

    /// Exact coordinate match, optionally scoped to one session key
    async fn find_location_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        session_id: Option<&str>,
    ) -> Result<Option<StoredLocation>>;

    async fn insert_forecast(&self, forecast: NewForecast) -> Result<StoredForecast>;

    async fn insert_observation(&self, observation: NewObservation) -> Result<StoredObservation>;

    async fn list_forecasts_by_location(&self, location_id: RowId) -> Result<Vec<StoredForecast>>;

    async fn list_observations_by_location(
        &self,
        location_id: RowId,
    ) -> Result<Vec<StoredObservation>>;

    async fn find_accuracy_metric(
        &self,
        forecast_id: RowId,
        observation_id: RowId,
    ) -> Result<Option<StoredAccuracyMetric>>;

    async fn insert_accuracy_metric(&self, metric: AccuracyMetric) -> Result<StoredAccuracyMetric>;

    /// Metrics whose forecast belongs to the location, with that forecast's provider
    async fn list_accuracy_metrics_by_location(
        &self,
        location_id: RowId,
    ) -> Result<Vec<ProviderAccuracy>>;
}

const SESSION_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Anonymous session key: `session_<unix millis>_<9 random chars>`
#[must_use]
pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| char::from(SESSION_CHARSET[rng.random_range(0..SESSION_CHARSET.len())]))
        .collect();
    format!("session_{}_{suffix}", Utc::now().timestamp_millis())
}

/// Behaviour every backend must share
#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use crate::WeatherCompareError;
    use crate::models::{ForecastPoint, Location, WeatherObservation};
    use chrono::{DateTime, TimeZone};

    pub fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    pub fn observation(temperature: f64, timestamp: DateTime<Utc>) -> WeatherObservation {
        WeatherObservation {
            temperature: Some(temperature),
            humidity: Some(50.0),
            pressure: Some(1013.0),
            wind_speed: Some(10.0),
            wind_direction: None,
            condition: "Clear".to_string(),
            description: None,
            icon: None,
            timestamp,
        }
    }

    pub fn new_location(session_id: &str, latitude: f64, longitude: f64) -> NewLocation {
        NewLocation {
            session_id: session_id.to_string(),
            location: Location::new(latitude, longitude),
        }
    }

    pub fn new_forecast(location_id: RowId, provider_id: &str, hour: u32) -> NewForecast {
        NewForecast {
            location_id,
            provider_id: provider_id.to_string(),
            forecast: ForecastPoint::new(observation(70.0, at(hour)), 0),
            forecast_timestamp: at(hour),
        }
    }

    pub fn new_observation(location_id: RowId, hour: u32) -> NewObservation {
        NewObservation {
            location_id,
            observation: observation(71.0, at(hour)),
            observed_timestamp: at(hour),
        }
    }

    pub fn metric(forecast_id: RowId, observation_id: RowId) -> AccuracyMetric {
        AccuracyMetric {
            forecast_id,
            observation_id,
            accuracy_score: 98.0,
            temperature_error: Some(1.0),
            humidity_error: Some(0.0),
            pressure_error: Some(0.0),
            wind_speed_error: None,
        }
    }

    pub async fn location_roundtrip(store: &dyn WeatherStore) {
        let stored = store
            .insert_location(new_location("session_a", 40.7128, -74.006))
            .await
            .unwrap();
        store
            .insert_location(new_location("session_b", 40.7128, -74.006))
            .await
            .unwrap();

        let fetched = store.get_location(stored.id).await.unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert!(store.get_location(stored.id + 100).await.unwrap().is_none());

        let by_session = store
            .find_location_by_coordinates(40.7128, -74.006, Some("session_b"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_session.session_id, "session_b");

        let any_session = store
            .find_location_by_coordinates(40.7128, -74.006, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(any_session.id, stored.id);

        // Coordinates must match exactly
        assert!(
            store
                .find_location_by_coordinates(40.7129, -74.006, None)
                .await
                .unwrap()
                .is_none()
        );
    }

    pub async fn rows_are_scoped_by_location(store: &dyn WeatherStore) {
        let here = store.insert_location(new_location("s", 1.0, 2.0)).await.unwrap();
        let there = store.insert_location(new_location("s", 3.0, 4.0)).await.unwrap();

        let first = store.insert_forecast(new_forecast(here.id, "noaa", 9)).await.unwrap();
        let second = store
            .insert_forecast(new_forecast(here.id, "weatherapi", 10))
            .await
            .unwrap();
        store.insert_forecast(new_forecast(there.id, "noaa", 9)).await.unwrap();
        store.insert_observation(new_observation(here.id, 9)).await.unwrap();

        assert!(second.id > first.id);

        let forecasts = store.list_forecasts_by_location(here.id).await.unwrap();
        let ids: Vec<RowId> = forecasts.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(forecasts[1].provider_id, "weatherapi");
        assert_eq!(forecasts[0].forecast.weather.temperature, Some(70.0));

        assert_eq!(store.list_observations_by_location(here.id).await.unwrap().len(), 1);
        assert!(store.list_observations_by_location(there.id).await.unwrap().is_empty());
    }

    pub async fn metrics_join_provider(store: &dyn WeatherStore) {
        let here = store.insert_location(new_location("s", 1.0, 2.0)).await.unwrap();
        let elsewhere = store.insert_location(new_location("s", 5.0, 6.0)).await.unwrap();
        let forecast = store
            .insert_forecast(new_forecast(here.id, "openweather", 9))
            .await
            .unwrap();
        let observation = store.insert_observation(new_observation(here.id, 9)).await.unwrap();

        assert!(
            store
                .find_accuracy_metric(forecast.id, observation.id)
                .await
                .unwrap()
                .is_none()
        );

        let stored = store
            .insert_accuracy_metric(metric(forecast.id, observation.id))
            .await
            .unwrap();
        let found = store
            .find_accuracy_metric(forecast.id, observation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, stored);

        let metrics = store.list_accuracy_metrics_by_location(here.id).await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].provider_id, "openweather");
        assert_eq!(metrics[0].stored.metric.temperature_error, Some(1.0));

        assert!(
            store
                .list_accuracy_metrics_by_location(elsewhere.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    pub async fn metric_for_unknown_forecast(store: &dyn WeatherStore) {
        let err = store.insert_accuracy_metric(metric(999, 1)).await.unwrap_err();
        assert!(matches!(err, WeatherCompareError::NotFound { .. }));
    }
}
