//! Configuration management for the weather comparison service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::WeatherCompareError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable carrying the OpenWeatherMap key when the config has none
pub const OPENWEATHER_KEY_VAR: &str = "OPENWEATHER_API_KEY";
/// Environment variable carrying the WeatherAPI.com key when the config has none
pub const WEATHERAPI_KEY_VAR: &str = "WEATHERAPI_KEY";

const MAX_TIMEOUT_SECONDS: u64 = 120;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream weather provider settings
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Persistence backend
    #[serde(default)]
    pub storage: StorageConfig,
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub noaa: NoaaConfig,
    #[serde(default)]
    pub openweather: OpenWeatherConfig,
    #[serde(default)]
    pub weatherapi: WeatherApiConfig,
}

/// National Weather Service settings; no credential needed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoaaConfig {
    #[serde(default = "default_noaa_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Sent on every request; api.weather.gov rejects anonymous clients
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// OpenWeatherMap settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenWeatherConfig {
    /// Empty leaves the provider unconfigured
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openweather_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// WeatherAPI.com settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherApiConfig {
    /// Empty leaves the provider unconfigured
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_weatherapi_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend (memory or fjall)
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    /// Database directory for the fjall backend
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_noaa_base_url() -> String {
    "https://api.weather.gov".to_string()
}

fn default_openweather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_weatherapi_base_url() -> String {
    "https://api.weatherapi.com/v1".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("weather-compare/{} (contact@weather-compare.dev)", crate::VERSION)
}

fn default_storage_backend() -> String {
    "fjall".to_string()
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from("weather-compare-data"),
        |dir| dir.join("weather-compare"),
    )
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for NoaaConfig {
    fn default() -> Self {
        Self {
            base_url: default_noaa_base_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openweather_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for WeatherApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_weatherapi_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl NoaaConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl OpenWeatherConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl WeatherApiConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|path| path.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // WEATHER_COMPARE__PROVIDERS__OPENWEATHER__API_KEY and friends
        builder = builder.add_source(
            Environment::with_prefix("WEATHER_COMPARE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_credential_fallbacks(|name| std::env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weather-compare").join("config.toml"))
    }

    /// Fill empty provider keys from the conventional credential variables
    pub fn apply_credential_fallbacks<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.providers.openweather.api_key.is_empty()
            && let Some(key) = lookup(OPENWEATHER_KEY_VAR)
        {
            self.providers.openweather.api_key = key.trim().to_string();
        }
        if self.providers.weatherapi.api_key.is_empty()
            && let Some(key) = lookup(WEATHERAPI_KEY_VAR)
        {
            self.providers.weatherapi.api_key = key.trim().to_string();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_providers()?;
        self.validate_string_values()?;

        if self.server.port == 0 {
            return Err(WeatherCompareError::config("Server port cannot be 0").into());
        }

        Ok(())
    }

    fn validate_providers(&self) -> Result<()> {
        let providers = &self.providers;
        let endpoints = [
            ("noaa", providers.noaa.base_url.as_str(), providers.noaa.timeout_seconds),
            (
                "openweather",
                providers.openweather.base_url.as_str(),
                providers.openweather.timeout_seconds,
            ),
            (
                "weatherapi",
                providers.weatherapi.base_url.as_str(),
                providers.weatherapi.timeout_seconds,
            ),
        ];

        for (name, base_url, timeout_seconds) in endpoints {
            if timeout_seconds == 0 || timeout_seconds > MAX_TIMEOUT_SECONDS {
                return Err(WeatherCompareError::config(format!(
                    "{name} timeout must be between 1 and {MAX_TIMEOUT_SECONDS} seconds"
                ))
                .into());
            }

            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(WeatherCompareError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        if providers.noaa.user_agent.trim().is_empty() {
            return Err(WeatherCompareError::config("noaa user agent cannot be empty").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(WeatherCompareError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(WeatherCompareError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let valid_backends = ["memory", "fjall"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(WeatherCompareError::config(format!(
                "Invalid storage backend '{}'. Must be one of: {}",
                self.storage.backend,
                valid_backends.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.providers.noaa.base_url, "https://api.weather.gov");
        assert_eq!(config.providers.openweather.timeout_seconds, 10);
        assert!(config.providers.weatherapi.api_key.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_api_key_is_valid() {
        let mut config = AppConfig::default();
        config.providers.openweather.api_key = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_timeout_range() {
        let mut config = AppConfig::default();
        config.providers.weatherapi.timeout_seconds = 500;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("weatherapi timeout"));

        config.providers.weatherapi.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_base_url_and_backend() {
        let mut config = AppConfig::default();
        config.providers.noaa.base_url = "ftp://weather.gov".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.backend = "sqlite".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid storage backend"));
    }

    #[test]
    fn test_credential_fallbacks_only_fill_empty_keys() {
        let mut config = AppConfig::default();
        config.providers.weatherapi.api_key = "from-file".to_string();

        config.apply_credential_fallbacks(|name| match name {
            OPENWEATHER_KEY_VAR => Some(" ow-key ".to_string()),
            WEATHERAPI_KEY_VAR => Some("wa-key".to_string()),
            _ => None,
        });

        assert_eq!(config.providers.openweather.api_key, "ow-key");
        assert_eq!(config.providers.weatherapi.api_key, "from-file");
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[providers.openweather]
api_key = "file-key"
timeout_seconds = 5

[storage]
backend = "memory"

[server]
port = 8088
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.providers.openweather.api_key, "file-key");
        assert_eq!(config.providers.openweather.timeout(), Duration::from_secs(5));
        assert_eq!(config.providers.noaa.base_url, "https://api.weather.gov");
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.server.address(), "0.0.0.0:8088");
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = AppConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("weather-compare"));
            assert!(path.to_string_lossy().ends_with("config.toml"));
        }
    }
}
