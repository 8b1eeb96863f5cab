//! Weather Compare - multi-provider weather aggregation
//!
//! Fans one coordinate query out to several weather providers in parallel,
//! normalizes their payloads into one canonical shape, and scores each
//! provider's stored forecasts against what was later observed.

pub mod accuracy;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod units;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use accuracy::AccuracyEngine;
pub use config::AppConfig;
pub use error::WeatherCompareError;
pub use models::{Comparison, ForecastPoint, Location, ProviderResult, WeatherObservation};
pub use registry::ProviderRegistry;
pub use service::ComparisonService;
pub use store::{FjallStore, MemoryStore, WeatherStore};
pub use weather::WeatherProvider;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WeatherCompareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
