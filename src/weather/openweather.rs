//! OpenWeatherMap adapter
//!
//! Requests use `units=imperial`, so temperatures arrive in °F and wind in mph.
//! Pressure is already hPa.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::{MAX_FORECAST_POINTS, WeatherProvider, get_json};
use crate::config::OpenWeatherConfig;
use crate::models::{ForecastPoint, Location, ProviderReport, WeatherObservation};
use crate::units::round1;
use crate::{Result, WeatherCompareError};

pub const ID: &str = "openweather";
pub const DISPLAY_NAME: &str = "OpenWeatherMap";

/// The forecast endpoint returns 3-hour steps
const STEP_HOURS: u32 = 3;

pub struct OpenWeatherProvider {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenWeatherProvider {
    #[must_use]
    pub fn new(client: Client, config: &OpenWeatherConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.trim().to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<T> {
        let request = self
            .client
            .get(format!("{}/{endpoint}", self.base_url))
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "imperial".to_string()),
            ]);
        get_json(request, DISPLAY_NAME, self.timeout).await
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
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

    #[tracing::instrument(name = "openweather_fetch", level = "debug", skip(self))]
    async fn fetch_weather(&self, latitude: f64, longitude: f64) -> Result<ProviderReport> {
        if !self.is_configured() {
            return Err(WeatherCompareError::not_configured(ID));
        }

        let (current, forecast) = tokio::try_join!(
            self.get::<schema::CurrentResponse>("weather", latitude, longitude),
            self.get::<schema::ForecastResponse>("forecast", latitude, longitude),
        )?;

        let report = ProviderReport {
            provider_id: ID.to_string(),
            current: to_observation(
                &current.main,
                current.wind.as_ref(),
                &current.weather,
                current.dt,
            ),
            forecast: transform_forecast(&forecast.list),
            location: extract_location(&current, &forecast, latitude, longitude),
        };

        info!(forecast_points = report.forecast.len(), "OpenWeatherMap weather fetched");
        Ok(report)
    }
}

fn to_observation(
    main: &schema::Main,
    wind: Option<&schema::Wind>,
    conditions: &[schema::Condition],
    timestamp: chrono::DateTime<chrono::Utc>,
) -> WeatherObservation {
    let condition = conditions.first();

    WeatherObservation {
        temperature: main.temp.map(round1),
        humidity: main.humidity,
        pressure: main.pressure.map(round1),
        wind_speed: wind.and_then(|w| w.speed).map(round1),
        wind_direction: wind.and_then(|w| w.deg),
        condition: condition
            .map(|c| c.main.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
        description: condition.and_then(|c| c.description.clone()),
        icon: condition.and_then(|c| c.icon.clone()),
        timestamp,
    }
}

fn transform_forecast(items: &[schema::ForecastItem]) -> Vec<ForecastPoint> {
    items
        .iter()
        .take(MAX_FORECAST_POINTS)
        .zip((0..).step_by(STEP_HOURS as usize))
        .map(|(item, hours)| {
            ForecastPoint::new(
                to_observation(&item.main, item.wind.as_ref(), &item.weather, item.dt),
                hours,
            )
        })
        .collect()
}

fn extract_location(
    current: &schema::CurrentResponse,
    forecast: &schema::ForecastResponse,
    latitude: f64,
    longitude: f64,
) -> Location {
    let city_block = forecast.city.as_ref();
    let city = current
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .or_else(|| city_block.and_then(|c| c.name.clone()));
    let country = current
        .sys
        .as_ref()
        .and_then(|s| s.country.clone())
        .filter(|c| !c.is_empty())
        .or_else(|| city_block.and_then(|c| c.country.clone()));

    Location::with_place(latitude, longitude, city, None, country)
}

/// OpenWeatherMap 2.5 payloads, trimmed to the fields in use
mod schema {
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct Main {
        pub temp: Option<f64>,
        pub humidity: Option<f64>,
        pub pressure: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Wind {
        pub speed: Option<f64>,
        pub deg: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Condition {
        #[serde(default)]
        pub main: String,
        pub description: Option<String>,
        pub icon: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Sys {
        pub country: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CurrentResponse {
        pub main: Main,
        pub wind: Option<Wind>,
        #[serde(default)]
        pub weather: Vec<Condition>,
        #[serde(with = "chrono::serde::ts_seconds")]
        pub dt: DateTime<Utc>,
        pub name: Option<String>,
        pub sys: Option<Sys>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ForecastItem {
        pub main: Main,
        pub wind: Option<Wind>,
        #[serde(default)]
        pub weather: Vec<Condition>,
        #[serde(with = "chrono::serde::ts_seconds")]
        pub dt: DateTime<Utc>,
    }

    #[derive(Debug, Deserialize)]
    pub struct City {
        pub name: Option<String>,
        pub country: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ForecastResponse {
        #[serde(default)]
        pub list: Vec<ForecastItem>,
        pub city: Option<City>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, api_key: &str) -> OpenWeatherProvider {
        let config = OpenWeatherConfig {
            api_key: api_key.to_string(),
            base_url: server.uri(),
            ..OpenWeatherConfig::default()
        };
        OpenWeatherProvider::new(Client::new(), &config)
    }

    fn item(dt: i64, temp: f64) -> serde_json::Value {
        json!({
            "dt": dt,
            "main": {"temp": temp, "humidity": 55, "pressure": 1009.46},
            "wind": {"speed": 7.36, "deg": 200},
            "weather": [{"main": "Rain", "description": "light rain", "icon": "10d"}]
        })
    }

    async fn mount_upstream(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("appid", "ow-key"))
            .and(query_param("units", "imperial"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dt": 1_717_243_200,
                "main": {"temp": 68.04, "humidity": 41, "pressure": 1015},
                "wind": {"speed": 12.66, "deg": 310},
                "weather": [{"main": "Clouds", "description": "scattered clouds", "icon": "03d"}],
                "name": "",
                "sys": {"country": "GB"}
            })))
            .mount(server)
            .await;

        let list: Vec<_> = (0..40).map(|i| item(1_717_243_200 + i * 10_800, 60.0)).collect();
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("appid", "ow-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "list": list,
                "city": {"name": "London", "country": "GB"}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_weather_keeps_imperial_units() {
        let server = MockServer::start().await;
        mount_upstream(&server).await;

        let report = provider(&server, "ow-key")
            .fetch_weather(51.5074, -0.1278)
            .await
            .unwrap();

        assert_eq!(report.provider_id, "openweather");
        assert_eq!(report.current.temperature, Some(68.0));
        assert_eq!(report.current.humidity, Some(41.0));
        assert_eq!(report.current.pressure, Some(1015.0));
        assert_eq!(report.current.wind_speed, Some(12.7));
        assert_eq!(report.current.wind_direction, Some(310.0));
        assert_eq!(report.current.condition, "Clouds");
        assert_eq!(report.current.icon.as_deref(), Some("03d"));
        assert_eq!(report.current.timestamp.timestamp(), 1_717_243_200);

        // Empty current name falls back to the forecast city block
        assert_eq!(report.location.city.as_deref(), Some("London"));
        assert_eq!(report.location.country.as_deref(), Some("GB"));
    }

    #[tokio::test]
    async fn test_forecast_is_truncated_with_three_hour_offsets() {
        let server = MockServer::start().await;
        mount_upstream(&server).await;

        let report = provider(&server, "ow-key")
            .fetch_weather(51.5074, -0.1278)
            .await
            .unwrap();

        assert_eq!(report.forecast.len(), 24);
        assert_eq!(report.forecast[1].forecast_hours, 3);
        assert_eq!(report.forecast[23].forecast_hours, 69);
        assert_eq!(report.forecast[0].weather.pressure, Some(1009.5));
        assert_eq!(report.forecast[0].weather.wind_speed, Some(7.4));
        assert_eq!(report.forecast[0].weather.condition, "Rain");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = provider(&server, "  ");
        assert!(!provider.is_configured());

        let err = provider.fetch_weather(1.0, 2.0).await.unwrap_err();
        assert!(matches!(err, WeatherCompareError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_invalid_key_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "cod": 401,
                "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."
            })))
            .mount(&server)
            .await;

        let err = provider(&server, "bad-key")
            .fetch_weather(1.0, 2.0)
            .await
            .unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[test]
    fn test_empty_condition_list_is_unknown() {
        let main = schema::Main {
            temp: Some(50.0),
            humidity: None,
            pressure: None,
        };
        let observation = to_observation(&main, None, &[], chrono::Utc::now());
        assert_eq!(observation.condition, "Unknown");
        assert_eq!(observation.humidity, None);
        assert_eq!(observation.wind_speed, None);
    }
}
