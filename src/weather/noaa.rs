//! National Weather Service (api.weather.gov) adapter
//!
//! No credential is needed. A point lookup resolves the forecast URL and the
//! station list; the latest station observation and the forecast are then
//! fetched concurrently.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use tracing::{debug, info};

use super::{MAX_FORECAST_POINTS, WeatherProvider, get_json};
use crate::config::NoaaConfig;
use crate::models::{ForecastPoint, Location, ProviderReport, WeatherObservation};
use crate::units::{
    STANDARD_PRESSURE_HPA, cardinal_to_degrees, celsius_to_fahrenheit, kmh_to_mph, ms_to_mph,
    pascals_to_hpa, round1,
};
use crate::{Result, WeatherCompareError};

pub const ID: &str = "noaa";
pub const DISPLAY_NAME: &str = "NOAA";

/// Forecast periods are 12-hour blocks
const PERIOD_HOURS: u32 = 12;

pub struct NoaaProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl NoaaProvider {
    #[must_use]
    pub fn new(client: Client, config: &NoaaConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let request = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/geo+json");
        get_json(request, DISPLAY_NAME, self.timeout).await
    }
}

#[async_trait]
impl WeatherProvider for NoaaProvider {
    fn id(&self) -> &'static str {
        ID
    }

    fn display_name(&self) -> &'static str {
        DISPLAY_NAME
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(name = "noaa_fetch", level = "debug", skip(self))]
    async fn fetch_weather(&self, latitude: f64, longitude: f64) -> Result<ProviderReport> {
        let point: schema::PointResponse = self
            .get(&format!(
                "{}/points/{latitude:.4},{longitude:.4}",
                self.base_url
            ))
            .await?;

        let stations: schema::StationsResponse =
            self.get(&point.properties.observation_stations).await?;
        let station = nearest_station(&stations).ok_or_else(|| {
            WeatherCompareError::upstream(DISPLAY_NAME, "No observation station found")
        })?;
        debug!(station, "resolved nearest observation station");

        let observation_url = format!(
            "{}/stations/{station}/observations/latest",
            self.base_url
        );
        let (observation, forecast) = tokio::try_join!(
            self.get::<schema::ObservationResponse>(&observation_url),
            self.get::<schema::ForecastResponse>(&point.properties.forecast),
        )?;

        let periods = &forecast.properties.periods;
        let report = ProviderReport {
            provider_id: ID.to_string(),
            current: transform_observation(&observation.properties, periods.first()),
            forecast: transform_forecast(periods),
            location: extract_location(&point, latitude, longitude),
        };

        info!(
            station,
            forecast_points = report.forecast.len(),
            "NOAA weather fetched"
        );
        Ok(report)
    }
}

fn nearest_station(stations: &schema::StationsResponse) -> Option<&str> {
    stations
        .features
        .first()
        .and_then(|f| f.properties.as_ref())
        .and_then(|p| p.station_identifier.as_deref())
}

fn measurement_value(measurement: Option<&schema::Measurement>) -> Option<f64> {
    measurement.and_then(|m| m.value)
}

/// Observation temperature in °F, converted by its unit tag
fn observed_fahrenheit(measurement: &schema::Measurement) -> Option<f64> {
    let value = measurement.value?;
    Some(match measurement.unit_code.as_str() {
        "wmoUnit:degC" => celsius_to_fahrenheit(value),
        _ => value,
    })
}

/// Observation wind speed in mph, converted by its unit tag
fn observed_mph(measurement: &schema::Measurement) -> Option<f64> {
    let value = measurement.value?;
    Some(match measurement.unit_code.as_str() {
        "wmoUnit:m_s-1" => ms_to_mph(value),
        "wmoUnit:km_h-1" => kmh_to_mph(value),
        _ => value,
    })
}

fn period_fahrenheit(period: &schema::ForecastPeriod) -> Option<f64> {
    let value = period.temperature?;
    Some(match period.temperature_unit.as_deref() {
        Some("C") => celsius_to_fahrenheit(value),
        _ => value,
    })
}

/// Leading number of a wind string such as "10 mph", "10mph" or "5 to 10 mph"
fn parse_wind_speed(raw: &str) -> Option<f64> {
    let raw = raw.trim_start();
    let sign = usize::from(raw.starts_with(['-', '+']));
    let mut seen_dot = false;
    let len = raw[sign..]
        .char_indices()
        .take_while(|&(_, c)| {
            if c == '.' && !seen_dot {
                seen_dot = true;
                true
            } else {
                c.is_ascii_digit()
            }
        })
        .last()
        .map_or(0, |(i, c)| i + c.len_utf8());
    raw[..sign + len].parse().ok()
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty()).cloned()
}

fn transform_observation(
    observation: &schema::Observation,
    first_period: Option<&schema::ForecastPeriod>,
) -> WeatherObservation {
    let temperature = observation
        .temperature
        .as_ref()
        .and_then(observed_fahrenheit)
        .or_else(|| first_period.and_then(period_fahrenheit));

    let humidity = measurement_value(observation.relative_humidity.as_ref()).or_else(|| {
        first_period.and_then(|p| measurement_value(p.relative_humidity.as_ref()))
    });

    let condition = non_empty(observation.text_description.as_ref())
        .or_else(|| first_period.and_then(|p| non_empty(p.short_forecast.as_ref())))
        .unwrap_or_else(|| "Unknown".to_string());

    let description = first_period
        .and_then(|p| non_empty(p.detailed_forecast.as_ref()))
        .or_else(|| non_empty(observation.text_description.as_ref()));

    WeatherObservation {
        temperature: temperature.map(round1),
        humidity,
        pressure: measurement_value(observation.barometric_pressure.as_ref())
            .map(|pa| round1(pascals_to_hpa(pa))),
        wind_speed: observation
            .wind_speed
            .as_ref()
            .and_then(observed_mph)
            .map(round1),
        wind_direction: measurement_value(observation.wind_direction.as_ref()),
        condition,
        description,
        icon: non_empty(observation.icon.as_ref()),
        timestamp: observation.timestamp,
    }
}

fn transform_forecast(periods: &[schema::ForecastPeriod]) -> Vec<ForecastPoint> {
    periods
        .iter()
        .take(MAX_FORECAST_POINTS)
        .zip((0..).step_by(PERIOD_HOURS as usize))
        .map(|(period, hours)| {
            let weather = WeatherObservation {
                temperature: period_fahrenheit(period).map(round1),
                humidity: measurement_value(period.relative_humidity.as_ref()),
                // The forecast product carries no pressure
                pressure: Some(STANDARD_PRESSURE_HPA),
                wind_speed: period
                    .wind_speed
                    .as_deref()
                    .and_then(parse_wind_speed)
                    .map(round1),
                wind_direction: period.wind_direction.as_deref().and_then(cardinal_to_degrees),
                condition: non_empty(period.short_forecast.as_ref())
                    .unwrap_or_else(|| "Unknown".to_string()),
                description: non_empty(period.detailed_forecast.as_ref()),
                icon: non_empty(period.icon.as_ref()),
                timestamp: period.start_time,
            };
            ForecastPoint::new(weather, hours)
        })
        .collect()
}

fn extract_location(point: &schema::PointResponse, latitude: f64, longitude: f64) -> Location {
    let place = point
        .properties
        .relative_location
        .as_ref()
        .and_then(|r| r.properties.as_ref());

    Location::with_place(
        latitude,
        longitude,
        place.and_then(|p| p.city.clone()),
        place.and_then(|p| p.state.clone()),
        Some("US".to_string()),
    )
}

/// api.weather.gov GeoJSON payloads, trimmed to the fields in use
mod schema {
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct PointResponse {
        pub properties: PointProperties,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PointProperties {
        pub forecast: String,
        pub observation_stations: String,
        pub relative_location: Option<RelativeLocation>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RelativeLocation {
        pub properties: Option<RelativeLocationProperties>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RelativeLocationProperties {
        pub city: Option<String>,
        pub state: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct StationsResponse {
        #[serde(default)]
        pub features: Vec<StationFeature>,
    }

    #[derive(Debug, Deserialize)]
    pub struct StationFeature {
        pub properties: Option<StationProperties>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StationProperties {
        pub station_identifier: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ObservationResponse {
        pub properties: Observation,
    }

    /// Quantitative value with a WMO unit tag; `value` is null when the station has no reading
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Measurement {
        pub value: Option<f64>,
        #[serde(default)]
        pub unit_code: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Observation {
        pub timestamp: DateTime<Utc>,
        pub temperature: Option<Measurement>,
        pub relative_humidity: Option<Measurement>,
        pub barometric_pressure: Option<Measurement>,
        pub wind_speed: Option<Measurement>,
        pub wind_direction: Option<Measurement>,
        pub text_description: Option<String>,
        pub icon: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ForecastResponse {
        pub properties: ForecastProperties,
    }

    #[derive(Debug, Deserialize)]
    pub struct ForecastProperties {
        #[serde(default)]
        pub periods: Vec<ForecastPeriod>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ForecastPeriod {
        pub start_time: DateTime<Utc>,
        pub temperature: Option<f64>,
        pub temperature_unit: Option<String>,
        pub relative_humidity: Option<Measurement>,
        pub wind_speed: Option<String>,
        pub wind_direction: Option<String>,
        pub short_forecast: Option<String>,
        pub detailed_forecast: Option<String>,
        pub icon: Option<String>,
    }
}
