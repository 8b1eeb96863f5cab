//! Forecast accuracy scoring
//!
//! Every stored forecast of a location is paired with the observation closest
//! to it in time, within [`ALIGNMENT_WINDOW_MS`]. Each pair is scored once and
//! the metric is kept; later runs reuse it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::Result;
use crate::models::{
    AccuracyMetric, ProviderAccuracy, Readings, RowId, StoredForecast, StoredObservation,
};
use crate::store::WeatherStore;

/// Maximum distance between a forecast and an observation, exclusive
pub const ALIGNMENT_WINDOW_MS: i64 = 3_600_000;

const TEMPERATURE_WEIGHT: f64 = 0.4;
const HUMIDITY_WEIGHT: f64 = 0.2;
const PRESSURE_WEIGHT: f64 = 0.2;
const WIND_SPEED_WEIGHT: f64 = 0.2;

/// Points lost per unit of absolute error
const TEMPERATURE_PENALTY: f64 = 2.0;
const HUMIDITY_PENALTY: f64 = 1.0;
const PRESSURE_PENALTY: f64 = 2.0;
const WIND_SPEED_PENALTY: f64 = 5.0;

/// Result of comparing one forecast against one observation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub accuracy_score: f64,
    pub temperature_error: Option<f64>,
    pub humidity_error: Option<f64>,
    pub pressure_error: Option<f64>,
    pub wind_speed_error: Option<f64>,
}

impl ScoreBreakdown {
    #[must_use]
    pub fn into_metric(self, forecast_id: RowId, observation_id: RowId) -> AccuracyMetric {
        AccuracyMetric {
            forecast_id,
            observation_id,
            accuracy_score: self.accuracy_score,
            temperature_error: self.temperature_error,
            humidity_error: self.humidity_error,
            pressure_error: self.pressure_error,
            wind_speed_error: self.wind_speed_error,
        }
    }
}

fn abs_error(forecast: Option<f64>, observed: Option<f64>) -> Option<f64> {
    Some((forecast? - observed?).abs())
}

/// Weighted average over the signals both sides report
///
/// Signals missing on either side are left out of the numerator and the
/// denominator alike. With no shared signal the score is 0.
#[must_use]
pub fn score(forecast: &Readings, observed: &Readings) -> ScoreBreakdown {
    let breakdown = ScoreBreakdown {
        accuracy_score: 0.0,
        temperature_error: abs_error(forecast.temperature, observed.temperature),
        humidity_error: abs_error(forecast.humidity, observed.humidity),
        pressure_error: abs_error(forecast.pressure, observed.pressure),
        wind_speed_error: abs_error(forecast.wind_speed, observed.wind_speed),
    };

    let signals = [
        (breakdown.temperature_error, TEMPERATURE_WEIGHT, TEMPERATURE_PENALTY),
        (breakdown.humidity_error, HUMIDITY_WEIGHT, HUMIDITY_PENALTY),
        (breakdown.pressure_error, PRESSURE_WEIGHT, PRESSURE_PENALTY),
        (breakdown.wind_speed_error, WIND_SPEED_WEIGHT, WIND_SPEED_PENALTY),
    ];

    let (weighted, total_weight) = signals
        .into_iter()
        .filter_map(|(error, weight, penalty)| error.map(|e| (e, weight, penalty)))
        .fold((0.0, 0.0), |(sum, total), (error, weight, penalty)| {
            let signal_score = (100.0 - error * penalty).max(0.0);
            (sum + signal_score * weight, total + weight)
        });

    let accuracy_score = if total_weight > 0.0 {
        (weighted / total_weight).clamp(0.0, 100.0)
    } else {
        0.0
    };

    ScoreBreakdown {
        accuracy_score,
        ..breakdown
    }
}

/// Observation nearest to `target`, strictly inside the alignment window
///
/// On equal distance the earlier entry in `observations` wins.
#[must_use]
pub fn find_closest_observation(
    target: DateTime<Utc>,
    observations: &[StoredObservation],
) -> Option<&StoredObservation> {
    let mut closest: Option<(i64, &StoredObservation)> = None;
    for observation in observations {
        let distance = (observation.observed_timestamp - target)
            .num_milliseconds()
            .abs();
        if distance < ALIGNMENT_WINDOW_MS && closest.is_none_or(|(best, _)| distance < best) {
            closest = Some((distance, observation));
        }
    }
    closest.map(|(_, observation)| observation)
}

/// Score a stored forecast against a stored observation
#[must_use]
pub fn score_pair(forecast: &StoredForecast, observation: &StoredObservation) -> AccuracyMetric {
    score(&forecast.forecast.readings(), &observation.observation.readings())
        .into_metric(forecast.id, observation.id)
}

/// Computes and reads accuracy metrics through a [`WeatherStore`]
#[derive(Clone)]
pub struct AccuracyEngine {
    store: Arc<dyn WeatherStore>,
}

impl AccuracyEngine {
    pub fn new(store: Arc<dyn WeatherStore>) -> Self {
        Self { store }
    }

    /// Score every aligned forecast of a location that has no metric yet
    ///
    /// Returns the number of metrics created by this run. The existence check
    /// and the insert are separate store calls, so two concurrent runs for the
    /// same location may both insert a metric for one pair.
    #[tracing::instrument(name = "accuracy_calculate", skip(self))]
    pub async fn calculate(&self, location_id: RowId) -> Result<usize> {
        let (forecasts, observations) = tokio::try_join!(
            self.store.list_forecasts_by_location(location_id),
            self.store.list_observations_by_location(location_id),
        )?;

        let mut created = 0;
        for forecast in &forecasts {
            let Some(observation) =
                find_closest_observation(forecast.forecast_timestamp, &observations)
            else {
                debug!(forecast_id = forecast.id, "No observation within alignment window");
                continue;
            };

            if self
                .store
                .find_accuracy_metric(forecast.id, observation.id)
                .await?
                .is_some()
            {
                continue;
            }

            let metric = score_pair(forecast, observation);
            debug!(
                forecast_id = forecast.id,
                observation_id = observation.id,
                provider = %forecast.provider_id,
                score = metric.accuracy_score,
                "Scored forecast"
            );
            self.store.insert_accuracy_metric(metric).await?;
            created += 1;
        }

        info!(
            location_id,
            forecasts = forecasts.len(),
            observations = observations.len(),
            created,
            "Accuracy calculation finished"
        );
        Ok(created)
    }

    /// Stored metrics of a location with each forecast's provider id
    pub async fn metrics_for_location(&self, location_id: RowId) -> Result<Vec<ProviderAccuracy>> {
        self.store.list_accuracy_metrics_by_location(location_id).await
    }

    /// Calculate, then list
    pub async fn evaluate(&self, location_id: RowId) -> Result<Vec<ProviderAccuracy>> {
        self.calculate(location_id).await?;
        self.metrics_for_location(location_id).await
    }
}
