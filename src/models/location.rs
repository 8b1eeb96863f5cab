//! Location model for geographic coordinates and metadata

use serde::{Deserialize, Serialize};

use crate::{Result, WeatherCompareError};

/// Location coordinates with optional place metadata
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// City name as reported by the provider
    #[serde(default)]
    pub city: Option<String>,
    /// State or region
    #[serde(default)]
    pub state: Option<String>,
    /// Country name or code
    #[serde(default)]
    pub country: Option<String>,
}

impl Location {
    /// Create a new location without place metadata
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            city: None,
            state: None,
            country: None,
        }
    }

    /// Create location with place metadata
    #[must_use]
    pub fn with_place(
        latitude: f64,
        longitude: f64,
        city: Option<String>,
        state: Option<String>,
        country: Option<String>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            city,
            state,
            country,
        }
    }

    /// Two locations are the same when their coordinates match exactly
    #[must_use]
    pub fn same_coordinates(&self, latitude: f64, longitude: f64) -> bool {
        self.latitude == latitude && self.longitude == longitude
    }

    fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Human readable name, falling back to the coordinates
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.city, &self.state) {
            (Some(city), Some(state)) => format!("{city}, {state}"),
            (Some(city), None) => city.clone(),
            _ => self.format_coordinates(),
        }
    }
}

/// Validate a coordinate pair against the WGS84 ranges
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(WeatherCompareError::validation(
            "Latitude and longitude must be finite numbers",
        ));
    }

    if !(-90.0..=90.0).contains(&latitude) {
        return Err(WeatherCompareError::validation(format!(
            "Latitude must be between -90 and 90, got: {latitude}"
        )));
    }

    if !(-180.0..=180.0).contains(&longitude) {
        return Err(WeatherCompareError::validation(format!(
            "Longitude must be between -180 and 180, got: {longitude}"
        )));
    }

    Ok(())
}

/// Parse and validate raw latitude/longitude strings
pub fn parse_coordinates(latitude: &str, longitude: &str) -> Result<(f64, f64)> {
    let lat = latitude.trim().parse::<f64>().map_err(|_| {
        WeatherCompareError::validation("Latitude and longitude are required")
    })?;
    let lon = longitude.trim().parse::<f64>().map_err(|_| {
        WeatherCompareError::validation("Latitude and longitude are required")
    })?;

    validate_coordinates(lat, lon)?;
    Ok((lat, lon))
}
