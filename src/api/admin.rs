//! Administrative reset, compiled only with the `admin` feature.
//!
//! `POST /weather/admin/reset` clears metrics, caches and breaker state.
//! When `WEATHER_ADMIN_USERNAME` and `WEATHER_ADMIN_PASSWORD` are set,
//! requests must carry matching `Authorization: Basic` credentials.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::model::AdminAuth;
use crate::server::AppState;

/// Credentials from an `Authorization: Basic` header, if well formed.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn authorized(auth: &AdminAuth, headers: &HeaderMap) -> bool {
    let (Some(expected_user), Some(expected_pass)) = (&auth.username, &auth.password) else {
        return true;
    };
    basic_credentials(headers)
        .is_some_and(|(user, pass)| &user == expected_user && &pass == expected_pass)
}

pub async fn reset_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !authorized(&state.service.config().admin, &headers) {
        tracing::warn!("rejected admin reset with missing or invalid credentials");
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"weathergate\"")],
        )
            .into_response();
    }

    state.service.reset();
    Json(serde_json::json!({ "status": "reset" })).into_response()
}
