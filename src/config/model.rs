//! Typed configuration produced by [`validate`](super::validation::validate).
//!
//! Contains [`Config`] (the root) and its sections: provider
//! credentials, upstream endpoints, HTTP timeouts, and the
//! [`ResilienceSettings`] that drive caching, retries, and the
//! circuit breaker.

use std::time::Duration;

use serde::Serialize;

use crate::model::Coordinates;
use crate::provider::ProviderKind;

pub const DEFAULT_LAT: f64 = 32.29;
pub const DEFAULT_LON: f64 = -64.78;

pub const DEFAULT_OPEN_METEO_URL: &str = "https://api.open-meteo.com";
pub const DEFAULT_WEATHERKIT_URL: &str = "https://weatherkit.apple.com";
pub const DEFAULT_OPENWEATHER_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub fallback_provider: Option<ProviderKind>,
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub default_location: Coordinates,
    pub http: HttpSettings,
    pub resilience: ResilienceSettings,
    pub admin: AdminAuth,
}

impl Config {
    /// Providers that will be constructed at startup, primary first.
    #[must_use]
    pub fn selected_providers(&self) -> Vec<ProviderKind> {
        let mut kinds = vec![self.provider];
        if let Some(fallback) = self.fallback_provider {
            kinds.push(fallback);
        }
        kinds
    }
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub weatherkit: Option<WeatherKitCredentials>,
    pub openweather_api_key: Option<String>,
}

// Secrets stay out of logs and `validate` output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("weatherkit", &self.weatherkit)
            .field(
                "openweather_api_key",
                &self.openweather_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Clone)]
pub struct WeatherKitCredentials {
    pub team_id: String,
    pub key_id: String,
    pub service_id: String,
    pub private_key: String,
    pub token_lifetime: Duration,
}

impl std::fmt::Debug for WeatherKitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherKitCredentials")
            .field("team_id", &self.team_id)
            .field("key_id", &self.key_id)
            .field("service_id", &self.service_id)
            .field("private_key", &"<redacted>")
            .field("token_lifetime", &self.token_lifetime)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Endpoints {
    pub open_meteo: String,
    pub weatherkit: String,
    pub openweather: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            open_meteo: DEFAULT_OPEN_METEO_URL.to_string(),
            weatherkit: DEFAULT_WEATHERKIT_URL.to_string(),
            openweather: DEFAULT_OPENWEATHER_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct HttpSettings {
    /// Bound on a single upstream call (connect + read).
    pub timeout: Duration,
    /// Bound on a provider health check.
    pub health_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            health_timeout: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ResilienceSettings {
    pub retry: RetryPolicy,
    pub cache: CacheSettings,
    pub circuit_breaker: CircuitBreakerSettings,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheSettings {
    pub ttl_fresh: Duration,
    pub stale_window: Duration,
    pub sweep_interval: Duration,
}

impl CacheSettings {
    /// Age after which an entry is dropped even if never re-fetched.
    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.ttl_fresh.saturating_add(self.stale_window)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_fresh: Duration::from_secs(600),
            stale_window: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub time_window: Duration,
    pub open_duration: Duration,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            time_window: Duration::from_secs(60),
            open_duration: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Default)]
pub struct AdminAuth {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
