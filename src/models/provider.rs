//! Per-provider fetch results and the aggregated comparison

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ForecastPoint, Location, WeatherObservation};
use crate::WeatherCompareError;

/// Normalized data from one provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReport {
    pub provider_id: String,
    pub current: WeatherObservation,
    pub forecast: Vec<ForecastPoint>,
    pub location: Location,
}

/// Why a provider produced no data
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotRegistered,
    NotConfigured,
    Upstream,
    Timeout,
}

/// A provider that produced no data, and why
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFailure {
    pub provider_id: String,
    pub kind: FailureKind,
    pub error_message: String,
}

impl ProviderFailure {
    pub fn new<P: Into<String>, M: Into<String>>(
        provider_id: P,
        kind: FailureKind,
        error_message: M,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            kind,
            error_message: error_message.into(),
        }
    }

    /// Capture a provider error as structured failure data
    #[must_use]
    pub fn from_error(provider_id: &str, error: &WeatherCompareError) -> Self {
        let kind = match error {
            WeatherCompareError::NotRegistered { .. } => FailureKind::NotRegistered,
            WeatherCompareError::NotConfigured { .. } => FailureKind::NotConfigured,
            WeatherCompareError::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::Upstream,
        };
        Self::new(provider_id, kind, error.to_string())
    }
}

/// Outcome of one provider call; the registry never raises
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderResult {
    Success(ProviderReport),
    Failure(ProviderFailure),
}

impl ProviderResult {
    #[must_use]
    pub fn provider_id(&self) -> &str {
        match self {
            Self::Success(report) => &report.provider_id,
            Self::Failure(failure) => &failure.provider_id,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn success(self) -> Option<ProviderReport> {
        match self {
            Self::Success(report) => Some(report),
            Self::Failure(_) => None,
        }
    }

    #[must_use]
    pub fn failure(self) -> Option<ProviderFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

/// Side-by-side results for one coordinate pair
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub location: Location,
    pub reports: Vec<ProviderReport>,
    pub failures: Vec<ProviderFailure>,
    pub fetched_at: DateTime<Utc>,
}

impl Comparison {
    /// Split settled provider results; fails when nothing succeeded
    pub fn from_results(results: Vec<ProviderResult>) -> crate::Result<Self> {
        let (mut reports, mut failures) = (Vec::new(), Vec::new());
        for result in results {
            match result {
                ProviderResult::Success(report) => reports.push(report),
                ProviderResult::Failure(failure) => failures.push(failure),
            }
        }

        let Some(first) = reports.first() else {
            return Err(WeatherCompareError::AllProvidersFailed { failures });
        };

        Ok(Self {
            location: first.location.clone(),
            reports,
            failures,
            fetched_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn provider_ids(&self) -> Vec<&str> {
        self.reports.iter().map(|r| r.provider_id.as_str()).collect()
    }
}

/// Configuration status of a registered provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub id: String,
    pub display_name: String,
    pub configured: bool,
}
