//! Persisted rows handed to and returned by the weather store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ForecastPoint, Location, WeatherObservation};

pub type RowId = i64;

/// Location to insert
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewLocation {
    pub session_id: String,
    pub location: Location,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredLocation {
    pub id: RowId,
    pub session_id: String,
    pub location: Location,
    pub created_at: DateTime<Utc>,
}

/// Forecast entry to insert, tagged with the provider that issued it
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewForecast {
    pub location_id: RowId,
    pub provider_id: String,
    pub forecast: ForecastPoint,
    pub forecast_timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredForecast {
    pub id: RowId,
    pub location_id: RowId,
    pub provider_id: String,
    pub forecast: ForecastPoint,
    pub forecast_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Observed weather to insert
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewObservation {
    pub location_id: RowId,
    pub observation: WeatherObservation,
    pub observed_timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredObservation {
    pub id: RowId,
    pub location_id: RowId,
    pub observation: WeatherObservation,
    pub observed_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Score of one forecast against its time-aligned observation
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyMetric {
    pub forecast_id: RowId,
    pub observation_id: RowId,
    /// Weighted score, 0-100
    pub accuracy_score: f64,
    pub temperature_error: Option<f64>,
    pub humidity_error: Option<f64>,
    pub pressure_error: Option<f64>,
    pub wind_speed_error: Option<f64>,
}

/// Metric rows are immutable once written
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredAccuracyMetric {
    pub id: RowId,
    #[serde(flatten)]
    pub metric: AccuracyMetric,
    pub created_at: DateTime<Utc>,
}

/// A stored metric joined with the provider of its forecast
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAccuracy {
    #[serde(flatten)]
    pub stored: StoredAccuracyMetric,
    pub provider_id: String,
}
