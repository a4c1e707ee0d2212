//! Shared fixtures for integration tests: a scripted provider, config
//! helpers, and an in-process server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use weathergate::config::model::Config;
use weathergate::config::validation::validate;
use weathergate::error::WeatherError;
use weathergate::metrics::MetricsCollector;
use weathergate::model::{
    Condition, CurrentConditions, UnifiedWeatherResponse, WeatherRequest,
};
use weathergate::provider::{Capabilities, ProviderHealth, ProviderKind, WeatherProvider};
use weathergate::server::{self, AppState};
use weathergate::service::WeatherService;

/// Provider that counts calls and answers from a switchable script.
pub struct SpyProvider {
    kind: ProviderKind,
    temp: i32,
    calls: AtomicU32,
    failure: Mutex<Option<WeatherError>>,
    healthy: AtomicBool,
}

impl SpyProvider {
    pub fn new(kind: ProviderKind, temp: i32) -> Arc<Self> {
        Arc::new(Self {
            kind,
            temp,
            calls: AtomicU32::new(0),
            failure: Mutex::new(None),
            healthy: AtomicBool::new(true),
        })
    }

    pub fn fail_with(&self, error: Option<WeatherError>) {
        *self.failure.lock() = error;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for SpyProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch_weather(
        &self,
        request: &WeatherRequest,
        _attempt: u32,
    ) -> Result<UnifiedWeatherResponse, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        Ok(UnifiedWeatherResponse {
            current: CurrentConditions {
                temp: self.temp,
                feels_like: self.temp + 1,
                humidity: 65,
                wind_speed: 12.0,
                wind_direction: "SW".into(),
                condition: Condition::PartlyCloudy,
            },
            hourly: vec![],
            daily: vec![],
            units: request.units(),
            issued_at: chrono::Utc::now(),
            provider: self.kind.as_str().into(),
            is_stale: false,
        })
    }

    async fn health_check(&self) -> ProviderHealth {
        let healthy = self.healthy.load(Ordering::SeqCst);
        ProviderHealth {
            healthy,
            response_time_ms: 3,
            error: (!healthy).then(|| "upstream unreachable".to_string()),
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            provider_name: self.kind.as_str().into(),
            requires_api_key: self.kind != ProviderKind::OpenMeteo,
            supports_hourly: true,
            supports_daily: true,
            supports_alerts: false,
        }
    }
}

pub fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Open-meteo primary with fast resilience settings, plus `extra` overrides.
pub fn config(extra: &[(&str, &str)]) -> Arc<Config> {
    let mut vars = env(&[
        ("WEATHER_PROVIDER", "open-meteo"),
        ("WEATHER_RETRIES", "0"),
        ("WEATHER_RETRY_BASE_DELAY_MS", "10"),
        ("WEATHER_RETRY_MAX_DELAY_MS", "50"),
    ]);
    vars.extend(env(extra));
    Arc::new(validate(&vars).expect("test config should validate"))
}

pub fn service(
    config: Arc<Config>,
    primary: &Arc<SpyProvider>,
    fallback: Option<&Arc<SpyProvider>>,
) -> Arc<WeatherService> {
    let primary: Arc<dyn WeatherProvider> = primary.clone();
    let fallback = fallback.map(|f| {
        let f: Arc<dyn WeatherProvider> = f.clone();
        f
    });
    Arc::new(WeatherService::with_providers(
        config,
        primary,
        fallback,
        Arc::new(MetricsCollector::new()),
    ))
}

pub async fn start_server(
    service: Arc<WeatherService>,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let router = server::build_router(Arc::new(AppState::new(service)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}
