//! WeatherAPI.com adapter
//!
//! One `forecast.json` call returns both current conditions and an hourly
//! forecast nested per day.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::{MAX_FORECAST_POINTS, WeatherProvider, get_json};
use crate::config::WeatherApiConfig;
use crate::models::{ForecastPoint, Location, ProviderReport, WeatherObservation};
use crate::units::{inhg_to_hpa, round1};
use crate::{Result, WeatherCompareError};

pub const ID: &str = "weatherapi";
pub const DISPLAY_NAME: &str = "WeatherAPI.com";

const FORECAST_DAYS: &str = "3";

pub struct WeatherApiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl WeatherApiProvider {
    #[must_use]
    pub fn new(client: Client, config: &WeatherApiConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.trim().to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> &'static str {
        ID
    }

    fn display_name(&self) -> &'static str {
        DISPLAY_NAME
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(name = "weatherapi_fetch", level = "debug", skip(self))]
    async fn fetch_weather(&self, latitude: f64, longitude: f64) -> Result<ProviderReport> {
        if !self.is_configured() {
            return Err(WeatherCompareError::not_configured(ID));
        }

        let query = format!("{latitude},{longitude}");
        let request = self
            .client
            .get(format!("{}/forecast.json", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", query.as_str()),
                ("days", FORECAST_DAYS),
                ("aqi", "no"),
                ("alerts", "no"),
            ]);
        let data: schema::ForecastResponse = get_json(request, DISPLAY_NAME, self.timeout).await?;

        let report = ProviderReport {
            provider_id: ID.to_string(),
            current: to_observation(&data.current.reading, data.current.last_updated_epoch),
            forecast: transform_forecast(&data.forecast.forecastday),
            location: Location::with_place(
                latitude,
                longitude,
                data.location.name,
                data.location.region,
                data.location.country,
            ),
        };

        info!(forecast_points = report.forecast.len(), "WeatherAPI.com weather fetched");
        Ok(report)
    }
}

fn to_observation(
    reading: &schema::Reading,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> WeatherObservation {
    WeatherObservation {
        temperature: reading.temp_f.map(round1),
        humidity: reading.humidity,
        pressure: reading.pressure_in.map(|inches| round1(inhg_to_hpa(inches))),
        wind_speed: reading.wind_mph.map(round1),
        wind_direction: reading.wind_degree,
        condition: reading.condition.text.clone(),
        description: Some(reading.condition.text.clone()).filter(|t| !t.is_empty()),
        icon: reading.condition.icon.clone(),
        timestamp,
    }
}

/// Flatten day -> hour in order, stopping once enough points are collected
fn transform_forecast(days: &[schema::ForecastDay]) -> Vec<ForecastPoint> {
    days.iter()
        .flat_map(|day| day.hour.iter())
        .take(MAX_FORECAST_POINTS)
        .zip(0..)
        .map(|(hour, offset)| {
            ForecastPoint::new(to_observation(&hour.reading, hour.time_epoch), offset)
        })
        .collect()
}

/// WeatherAPI.com v1 payloads, trimmed to the fields in use
mod schema {
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct ForecastResponse {
        pub location: ApiLocation,
        pub current: Current,
        pub forecast: Forecast,
    }

    #[derive(Debug, Deserialize)]
    pub struct ApiLocation {
        pub name: Option<String>,
        pub region: Option<String>,
        pub country: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Condition {
        #[serde(default)]
        pub text: String,
        pub icon: Option<String>,
    }

    /// Fields shared by the current block and every forecast hour
    #[derive(Debug, Deserialize)]
    pub struct Reading {
        pub temp_f: Option<f64>,
        pub humidity: Option<f64>,
        pub pressure_in: Option<f64>,
        pub wind_mph: Option<f64>,
        pub wind_degree: Option<f64>,
        pub condition: Condition,
    }

    #[derive(Debug, Deserialize)]
    pub struct Current {
        #[serde(with = "chrono::serde::ts_seconds")]
        pub last_updated_epoch: DateTime<Utc>,
        #[serde(flatten)]
        pub reading: Reading,
    }

    #[derive(Debug, Deserialize)]
    pub struct Forecast {
        #[serde(default)]
        pub forecastday: Vec<ForecastDay>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ForecastDay {
        #[serde(default)]
        pub hour: Vec<Hour>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Hour {
        #[serde(with = "chrono::serde::ts_seconds")]
        pub time_epoch: DateTime<Utc>,
        #[serde(flatten)]
        pub reading: Reading,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, api_key: &str) -> WeatherApiProvider {
        let config = WeatherApiConfig {
            api_key: api_key.to_string(),
            base_url: server.uri(),
            ..WeatherApiConfig::default()
        };
        WeatherApiProvider::new(Client::new(), &config)
    }

    fn hour(epoch: i64) -> serde_json::Value {
        json!({
            "time_epoch": epoch,
            "temp_f": 71.24,
            "humidity": 63,
            "pressure_in": 30.01,
            "wind_mph": 8.06,
            "wind_degree": 95,
            "condition": {"text": "Partly cloudy", "icon": "//cdn.weatherapi.com/116.png"}
        })
    }

    fn day(start: i64, hours: i64) -> serde_json::Value {
        let hours: Vec<_> = (0..hours).map(|h| hour(start + h * 3600)).collect();
        json!({"date_epoch": start, "hour": hours})
    }

    fn body(days: Vec<serde_json::Value>) -> serde_json::Value {
        json!({
            "location": {"name": "Denver", "region": "Colorado", "country": "United States of America"},
            "current": {
                "last_updated_epoch": 1_717_243_200,
                "temp_f": 64.9,
                "humidity": 30,
                "pressure_in": 29.92,
                "wind_mph": 6.9,
                "wind_degree": 160,
                "condition": {"text": "Sunny", "icon": "//cdn.weatherapi.com/113.png"}
            },
            "forecast": {"forecastday": days}
        })
    }

    #[tokio::test]
    async fn test_fetch_weather_converts_pressure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .and(query_param("key", "wa-key"))
            .and(query_param("q", "39.7392,-104.9903"))
            .and(query_param("days", "3"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(body(vec![day(1_717_200_000, 24)])),
            )
            .mount(&server)
            .await;

        let report = provider(&server, "wa-key")
            .fetch_weather(39.7392, -104.9903)
            .await
            .unwrap();

        assert_eq!(report.provider_id, "weatherapi");
        assert_eq!(report.current.pressure, Some(1013.2));
        assert_eq!(report.current.temperature, Some(64.9));
        assert_eq!(report.current.condition, "Sunny");
        assert_eq!(report.current.description.as_deref(), Some("Sunny"));
        assert_eq!(report.location.city.as_deref(), Some("Denver"));
        assert_eq!(report.location.state.as_deref(), Some("Colorado"));

        let first = &report.forecast[0];
        assert_eq!(first.weather.temperature, Some(71.2));
        assert_eq!(first.weather.pressure, Some(1016.3));
        assert_eq!(first.weather.wind_speed, Some(8.1));
        assert_eq!(first.weather.wind_direction, Some(95.0));
    }

    #[tokio::test]
    async fn test_forecast_flattens_across_days_and_stops_at_limit() {
        let server = MockServer::start().await;
        let days = vec![
            day(1_717_200_000, 10),
            day(1_717_286_400, 10),
            day(1_717_372_800, 10),
        ];
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(days)))
            .mount(&server)
            .await;

        let report = provider(&server, "wa-key")
            .fetch_weather(39.7392, -104.9903)
            .await
            .unwrap();

        assert_eq!(report.forecast.len(), 24);
        let offsets: Vec<u32> = report.forecast.iter().map(|p| p.forecast_hours).collect();
        assert_eq!(offsets, (0..24).collect::<Vec<u32>>());

        // The third day is only partially consumed
        assert_eq!(report.forecast[20].timestamp().timestamp(), 1_717_372_800);
        assert_eq!(report.forecast[23].timestamp().timestamp(), 1_717_372_800 + 3 * 3600);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server, "")
            .fetch_weather(1.0, 2.0)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherCompareError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_upstream_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 1006, "message": "No matching location found."}
            })))
            .mount(&server)
            .await;

        let err = provider(&server, "wa-key")
            .fetch_weather(1.0, 2.0)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "WeatherAPI.com API error: Bad Request - No matching location found."
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = provider(&server, "wa-key")
            .fetch_weather(1.0, 2.0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("malformed payload"));
    }

    #[tokio::test]
    async fn test_slow_upstream_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(body(vec![day(1_717_200_000, 1)]))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = WeatherApiConfig {
            api_key: "wa-key".to_string(),
            base_url: server.uri(),
            timeout_seconds: 1,
        };
        let err = WeatherApiProvider::new(Client::new(), &config)
            .fetch_weather(1.0, 2.0)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(matches!(
            err,
            WeatherCompareError::Timeout { ref provider, timeout_ms: 1000 } if provider == DISPLAY_NAME
        ));
    }
}
