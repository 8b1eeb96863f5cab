//! Data models for the weather comparison engine
//!
//! This module contains the core domain models organized by concern:
//! - Location: Geographic coordinates and place metadata
//! - Weather: Canonical observations and forecast points
//! - Provider: Per-provider fetch results and comparisons
//! - Stored: Rows exchanged with the persistence service

pub mod location;
pub mod provider;
pub mod stored;
pub mod weather;

// Re-export all public types for convenient access
pub use location::{Location, parse_coordinates, validate_coordinates};
pub use provider::{
    Comparison, FailureKind, ProviderFailure, ProviderReport, ProviderResult, ProviderStatus,
};
pub use stored::{
    AccuracyMetric, NewForecast, NewLocation, NewObservation, ProviderAccuracy, RowId,
    StoredAccuracyMetric, StoredForecast, StoredLocation, StoredObservation,
};
pub use weather::{ForecastPoint, Readings, WeatherObservation};
