//! `GET /health` endpoint handler.
//!
//! Process liveness only: version, uptime and the configured providers.
//! Upstream health lives at `/weather/health`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;
use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub provider: ProviderKind,
    pub fallback_provider: Option<ProviderKind>,
    pub initialized: bool,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = state.service.config();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        provider: config.provider,
        fallback_provider: config.fallback_provider,
        initialized: state.service.is_initialized(),
    })
}
