//! HTTP handlers for the weather query surface.
//!
//! Every handler reads the shared [`WeatherService`](crate::service::WeatherService)
//! from [`AppState`]. Classified [`WeatherError`]s render as
//! `{"error": CODE, "message": ...}` with the matching status code.

#[cfg(feature = "admin")]
pub mod admin;

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::WeatherError;
use crate::model::{Units, WeatherRequest};
use crate::server::AppState;
use crate::service::ProviderCapabilities;

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for WeatherError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.message().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Raw query parameters, parsed by hand so malformed values get the
/// classified error body rather than axum's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct WeatherQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub units: Option<String>,
}

fn parse_coordinate(raw: Option<&str>, name: &str, default: f64) -> Result<f64, WeatherError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => value
            .parse::<f64>()
            .map_err(|_| WeatherError::BadRequest(format!("{name} must be a number, got '{value}'"))),
    }
}

impl WeatherQuery {
    /// Build a validated request, filling missing coordinates from `default`.
    pub fn into_request(
        self,
        default: crate::model::Coordinates,
    ) -> Result<WeatherRequest, WeatherError> {
        let lat = parse_coordinate(self.lat.as_deref(), "lat", default.lat)?;
        let lon = parse_coordinate(self.lon.as_deref(), "lon", default.lon)?;
        let units = match self.units.as_deref().map(str::trim) {
            None | Some("") => Units::default(),
            Some(value) => value.parse()?,
        };
        WeatherRequest::new(lat, lon, units)
    }
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from)
}

pub async fn weather_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<WeatherQuery>,
) -> Response {
    let correlation_id = correlation_id(&headers);
    let span = tracing::info_span!("weather_request", correlation_id = %correlation_id);

    let mut response = async {
        let request = match query.into_request(state.service.default_location()) {
            Ok(r) => r,
            Err(e) => {
                tracing::info!(error = %e, "rejected weather query");
                return e.into_response();
            }
        };

        tracing::info!(
            lat = request.lat(),
            lon = request.lon(),
            units = %request.units(),
            "weather request received"
        );

        match state.service.get_current_weather(&request).await {
            Ok(weather) => {
                tracing::info!(
                    provider = %weather.provider,
                    is_stale = weather.is_stale,
                    "weather request served"
                );
                Json(weather).into_response()
            }
            Err(e) => {
                tracing::warn!(error_code = e.code(), error = %e, "weather request failed");
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

pub async fn weather_health_handler(State(state): State<Arc<AppState>>) -> Response {
    let health = state.service.health_check().await;
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health)).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    pub format: Option<String>,
}

pub async fn weather_metrics_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    let metrics = state.service.metrics();
    match query.format.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("prometheus") => (
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            metrics.export_prometheus(),
        )
            .into_response(),
        Some("json") => Json(metrics.snapshot()).into_response(),
        Some(other) => WeatherError::BadRequest(format!(
            "format must be 'prometheus' or 'json', got '{other}'"
        ))
        .into_response(),
    }
}

pub async fn capabilities_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProviderCapabilities>, WeatherError> {
    state.service.get_provider_capabilities().map(Json)
}
