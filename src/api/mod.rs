use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::WeatherCompareError;
use crate::models::{
    Comparison, ForecastPoint, NewForecast, NewObservation, ProviderAccuracy, ProviderFailure,
    ProviderStatus, RowId, StoredForecast, StoredLocation, StoredObservation, WeatherObservation,
    parse_coordinates,
};
use crate::service::ComparisonService;

type AppState = State<Arc<ComparisonService>>;
type ApiResult<T> = Result<T, ApiError>;

pub fn router(service: Arc<ComparisonService>) -> Router {
    Router::new()
        .route("/weather/compare", get(compare))
        .route("/weather/forecast", post(record_forecast))
        .route("/weather/actual", post(record_observation))
        .route("/location", post(register_location))
        .route("/accuracy/{location_id}", get(accuracy))
        .route("/providers", get(providers))
        .with_state(service)
}

/// Error body: `{ success: false, error, message }`
pub struct ApiError(WeatherCompareError);

impl From<WeatherCompareError> for ApiError {
    fn from(err: WeatherCompareError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(WeatherCompareError::validation(rejection.body_text()))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<ProviderFailure>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            WeatherCompareError::Validation { .. } | WeatherCompareError::NotRegistered { .. } => {
                StatusCode::BAD_REQUEST
            }
            WeatherCompareError::NotFound { .. } => StatusCode::NOT_FOUND,
            WeatherCompareError::AllProvidersFailed { .. }
            | WeatherCompareError::Upstream { .. }
            | WeatherCompareError::Timeout { .. }
            | WeatherCompareError::NotConfigured { .. } => StatusCode::BAD_GATEWAY,
            WeatherCompareError::Config { .. } | WeatherCompareError::Storage { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        }

        let failures = match &self.0 {
            WeatherCompareError::AllProvidersFailed { failures } => failures.clone(),
            _ => Vec::new(),
        };
        let body = Json(ErrorBody {
            success: false,
            error: self.0.user_message(),
            message: self.0.to_string(),
            failures,
        });
        (status, body).into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompareQuery {
    lat: Option<String>,
    lon: Option<String>,
    session_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_id: Option<RowId>,
    failures: Vec<ProviderFailure>,
    comparison: Comparison,
}

async fn compare(
    State(service): AppState,
    Query(query): Query<CompareQuery>,
) -> ApiResult<Json<CompareResponse>> {
    let (Some(lat), Some(lon)) = (query.lat.as_deref(), query.lon.as_deref()) else {
        return Err(WeatherCompareError::validation("Latitude and longitude are required").into());
    };
    let (latitude, longitude) = parse_coordinates(lat, lon)?;

    let session_id = query
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let outcome = service.compare(latitude, longitude, session_id).await?;

    Ok(Json(CompareResponse {
        success: true,
        location_id: outcome.location_id,
        failures: outcome.comparison.failures.clone(),
        comparison: outcome.comparison,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationRequest {
    latitude: f64,
    longitude: f64,
    session_id: Option<String>,
}

#[derive(Serialize)]
struct LocationResponse {
    success: bool,
    location: StoredLocation,
}

async fn register_location(
    State(service): AppState,
    payload: Result<Json<LocationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<LocationResponse>)> {
    let Json(request) = payload?;
    let location = service
        .register_location(request.latitude, request.longitude, request.session_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LocationResponse {
            success: true,
            location,
        }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastRequest {
    location_id: RowId,
    service_name: String,
    forecast_data: ForecastPoint,
    forecast_timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct ForecastResponse {
    success: bool,
    forecast: StoredForecast,
}

async fn record_forecast(
    State(service): AppState,
    payload: Result<Json<ForecastRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ForecastResponse>)> {
    let Json(request) = payload?;
    let forecast = service
        .record_forecast(NewForecast {
            location_id: request.location_id,
            provider_id: request.service_name,
            forecast: request.forecast_data,
            forecast_timestamp: request.forecast_timestamp,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ForecastResponse {
            success: true,
            forecast,
        }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationRequest {
    location_id: RowId,
    weather_data: WeatherObservation,
    observed_timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ObservationResponse {
    success: bool,
    actual_weather: StoredObservation,
}

async fn record_observation(
    State(service): AppState,
    payload: Result<Json<ObservationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ObservationResponse>)> {
    let Json(request) = payload?;
    let actual_weather = service
        .record_observation(NewObservation {
            location_id: request.location_id,
            observation: request.weather_data,
            observed_timestamp: request.observed_timestamp,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ObservationResponse {
            success: true,
            actual_weather,
        }),
    ))
}

#[derive(Serialize)]
struct AccuracyResponse {
    success: bool,
    metrics: Vec<ProviderAccuracy>,
}

async fn accuracy(
    State(service): AppState,
    location_id: Result<Path<RowId>, PathRejection>,
) -> ApiResult<Json<AccuracyResponse>> {
    let Path(location_id) = location_id
        .map_err(|_| WeatherCompareError::validation("Invalid location ID"))?;
    let metrics = service.accuracy(location_id).await?;
    Ok(Json(AccuracyResponse {
        success: true,
        metrics,
    }))
}

#[derive(Serialize)]
struct ProvidersResponse {
    success: bool,
    providers: Vec<ProviderStatus>,
}

async fn providers(State(service): AppState) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        success: true,
        providers: service.provider_statuses(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureKind;
    use rstest::rstest;

    #[rstest]
    #[case(WeatherCompareError::validation("bad latitude"), StatusCode::BAD_REQUEST)]
    #[case(WeatherCompareError::not_found("Location 9 does not exist"), StatusCode::NOT_FOUND)]
    #[case(WeatherCompareError::storage("disk full"), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(WeatherCompareError::upstream("NOAA", "Bad Gateway"), StatusCode::BAD_GATEWAY)]
    fn test_error_status(#[case] error: WeatherCompareError, #[case] expected: StatusCode) {
        assert_eq!(ApiError::from(error).into_response().status(), expected);
    }

    #[tokio::test]
    async fn test_total_failure_body_lists_failures() {
        let error = WeatherCompareError::AllProvidersFailed {
            failures: vec![ProviderFailure::new(
                "noaa",
                FailureKind::Timeout,
                "NOAA API error: request timed out after 10000ms",
            )],
        };
        let response = ApiError::from(error).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "All weather services failed");
        assert_eq!(body["failures"][0]["providerId"], "noaa");
        assert_eq!(body["failures"][0]["kind"], "timeout");
    }
}
