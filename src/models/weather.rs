//! Canonical weather shapes shared by every provider

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current weather in canonical units
///
/// Temperatures are °F, pressure hPa and wind speed mph. A reading the
/// provider did not report stays `None`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherObservation {
    /// Temperature in °F, one decimal
    pub temperature: Option<f64>,
    /// Relative humidity in percent
    pub humidity: Option<f64>,
    /// Atmospheric pressure in hPa, one decimal
    pub pressure: Option<f64>,
    /// Wind speed in mph, one decimal
    pub wind_speed: Option<f64>,
    /// Wind direction in degrees (0-360, where 0/360 is North)
    #[serde(default)]
    pub wind_direction: Option<f64>,
    /// Provider-native short condition text
    pub condition: String,
    /// Provider-native longer description
    #[serde(default)]
    pub description: Option<String>,
    /// Provider icon reference
    #[serde(default)]
    pub icon: Option<String>,
    /// Instant the reading applies to
    pub timestamp: DateTime<Utc>,
}

/// One forecast entry: an observation shape plus its display offset
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    #[serde(flatten)]
    pub weather: WeatherObservation,
    /// Hours from fetch time, used only for display ordering
    pub forecast_hours: u32,
}

/// The four signals that accuracy scoring compares
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Readings {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl WeatherObservation {
    #[must_use]
    pub fn readings(&self) -> Readings {
        Readings {
            temperature: self.temperature,
            humidity: self.humidity,
            pressure: self.pressure,
            wind_speed: self.wind_speed,
        }
    }
}

impl ForecastPoint {
    #[must_use]
    pub fn new(weather: WeatherObservation, forecast_hours: u32) -> Self {
        Self {
            weather,
            forecast_hours,
        }
    }

    #[must_use]
    pub fn readings(&self) -> Readings {
        self.weather.readings()
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.weather.timestamp
    }
}
