//! Upstream weather providers.
//!
//! Defines the [`WeatherProvider`] trait every upstream adapter
//! implements, the closed [`ProviderKind`] set, and [`build_provider`],
//! the single constructor the orchestrator uses. Submodules hold the
//! concrete adapters ([`open_meteo`], [`weatherkit`], [`openweather`]),
//! shared HTTP plumbing ([`http`]), and the WeatherKit token signer
//! ([`signer`]).

pub mod http;
pub mod open_meteo;
pub mod openweather;
pub mod signer;
pub mod weatherkit;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::model::Config;
use crate::error::{WeatherError, WeathergateError};
use crate::model::{Coordinates, UnifiedWeatherResponse, WeatherRequest};
use crate::server::HttpClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "open-meteo")]
    OpenMeteo,
    #[serde(rename = "weatherkit")]
    WeatherKit,
    #[serde(rename = "openweather")]
    OpenWeather,
}

impl ProviderKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenMeteo => "open-meteo",
            Self::WeatherKit => "weatherkit",
            Self::OpenWeather => "openweather",
        }
    }

    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::OpenMeteo, Self::WeatherKit, Self::OpenWeather]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lower = value.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| format!("unknown provider '{value}'"))
    }
}

/// Static per-provider metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub provider_name: String,
    pub requires_api_key: bool,
    pub supports_hourly: bool,
    pub supports_daily: bool,
    pub supports_alerts: bool,
}

/// Result of a lightweight health check against the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Settings every adapter needs regardless of upstream.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub health_timeout: Duration,
    /// Location fetched by health checks.
    pub health_location: Coordinates,
}

// async_trait is required here because providers are held as Arc<dyn WeatherProvider>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Fetch and normalize weather for `request`. `attempt` is 1-based and
    /// only used for telemetry.
    async fn fetch_weather(
        &self,
        request: &WeatherRequest,
        attempt: u32,
    ) -> Result<UnifiedWeatherResponse, WeatherError>;

    /// Check the upstream directly, bypassing cache and circuit breaker.
    async fn health_check(&self) -> ProviderHealth;

    fn capabilities(&self) -> Capabilities;
}

/// Construct the adapter for `kind` from validated config.
///
/// Credential problems surface here, at startup, rather than on the
/// first request.
pub fn build_provider(
    kind: ProviderKind,
    config: &Config,
    client: HttpClient,
) -> Result<Arc<dyn WeatherProvider>, WeathergateError> {
    let base_url = match kind {
        ProviderKind::OpenMeteo => &config.endpoints.open_meteo,
        ProviderKind::WeatherKit => &config.endpoints.weatherkit,
        ProviderKind::OpenWeather => &config.endpoints.openweather,
    };
    let settings = AdapterSettings {
        base_url: base_url.clone(),
        timeout: config.http.timeout,
        health_timeout: config.http.health_timeout,
        health_location: config.default_location,
    };

    let provider: Arc<dyn WeatherProvider> = match kind {
        ProviderKind::OpenMeteo => Arc::new(open_meteo::OpenMeteoProvider::new(client, settings)),
        ProviderKind::WeatherKit => {
            let credentials = config.credentials.weatherkit.as_ref().ok_or_else(|| {
                missing_credentials("WEATHERKIT_TEAM_ID", "weatherkit credentials are not configured")
            })?;
            let signer = signer::RequestSigner::new(credentials)?;
            Arc::new(weatherkit::WeatherKitProvider::new(client, settings, signer))
        }
        ProviderKind::OpenWeather => {
            let api_key = config.credentials.openweather_api_key.clone().ok_or_else(|| {
                missing_credentials("OPENWEATHER_API_KEY", "openweather API key is not configured")
            })?;
            Arc::new(openweather::OpenWeatherProvider::new(client, settings, api_key))
        }
    };

    tracing::info!(provider = %kind, base_url = %base_url, "weather provider ready");
    Ok(provider)
}

fn missing_credentials(variable: &str, message: &str) -> WeathergateError {
    WeathergateError::ConfigValidation {
        errors: vec![crate::error::ValidationError::new(variable, message)],
    }
}
