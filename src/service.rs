//! Weather orchestrator shared by every request handler.
//!
//! [`WeatherService`] owns the primary provider's
//! [`ResilienceCoordinator`] and, when configured, a second coordinator
//! for the fallback provider with its own cache and circuit breaker.
//! One instance lives in the server state; tests build isolated ones.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::config::model::Config;
use crate::error::{WeatherError, WeathergateError};
use crate::metrics::{MetricsCollector, MetricsSummary, FALLBACK_TOTAL};
use crate::model::{Coordinates, UnifiedWeatherResponse, WeatherRequest};
use crate::provider::{build_provider, Capabilities, ProviderKind, WeatherProvider};
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::{CoordinatorSummary, ResilienceCoordinator};
use crate::server::HttpClient;

struct Coordinators {
    primary: ResilienceCoordinator,
    fallback: Option<ResilienceCoordinator>,
}

/// Report served by `GET /weather/health`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub healthy: bool,
    pub provider: ProviderKind,
    pub is_stale: bool,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub circuit_state: CircuitState,
    pub cache_entries: usize,
    pub fallback_provider: Option<ProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<CoordinatorSummary>,
    pub metrics: MetricsSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderCapabilities {
    pub active: Capabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Capabilities>,
}

pub struct WeatherService {
    config: Arc<Config>,
    client: Option<HttpClient>,
    metrics: Arc<MetricsCollector>,
    coordinators: OnceCell<Coordinators>,
}

impl WeatherService {
    /// Service that builds its providers from `config` on [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(config: Arc<Config>, client: HttpClient) -> Self {
        Self {
            config,
            client: Some(client),
            metrics: Arc::new(MetricsCollector::new()),
            coordinators: OnceCell::new(),
        }
    }

    /// Service around already-built providers, initialized on return.
    ///
    /// A fallback of the same kind as the primary is ignored.
    #[must_use]
    pub fn with_providers(
        config: Arc<Config>,
        primary: Arc<dyn WeatherProvider>,
        fallback: Option<Arc<dyn WeatherProvider>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let coordinators = Self::coordinate(&config, &metrics, primary, fallback);
        Self {
            config,
            client: None,
            metrics,
            coordinators: OnceCell::new_with(Some(coordinators)),
        }
    }

    fn coordinate(
        config: &Config,
        metrics: &Arc<MetricsCollector>,
        primary: Arc<dyn WeatherProvider>,
        fallback: Option<Arc<dyn WeatherProvider>>,
    ) -> Coordinators {
        let primary_kind = primary.kind();
        let settings = &config.resilience;
        Coordinators {
            primary: ResilienceCoordinator::new(primary, *settings, Arc::clone(metrics)),
            fallback: fallback
                .filter(|f| f.kind() != primary_kind)
                .map(|f| ResilienceCoordinator::new(f, *settings, Arc::clone(metrics))),
        }
    }

    /// Build providers and coordinators. Safe to call repeatedly; only the
    /// first successful call constructs anything.
    pub async fn initialize(&self) -> Result<(), WeathergateError> {
        self.coordinators
            .get_or_try_init(|| async {
                let client = self.client.clone().ok_or_else(|| {
                    WeathergateError::ServiceInit("no HTTP client configured".into())
                })?;
                let primary = build_provider(self.config.provider, &self.config, client.clone())?;
                let fallback = self
                    .config
                    .fallback_provider
                    .filter(|kind| *kind != self.config.provider)
                    .map(|kind| build_provider(kind, &self.config, client))
                    .transpose()?;

                tracing::info!(
                    provider = %self.config.provider,
                    fallback = ?self.config.fallback_provider.map(ProviderKind::as_str),
                    "weather service initialized"
                );
                Ok::<_, WeathergateError>(Self::coordinate(
                    &self.config,
                    &self.metrics,
                    primary,
                    fallback,
                ))
            })
            .await
            .map(|_| ())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.coordinators.initialized()
    }

    fn coordinators(&self) -> Result<&Coordinators, WeatherError> {
        self.coordinators
            .get()
            .ok_or_else(|| WeatherError::Upstream("weather service is not initialized".into()))
    }

    /// Look up weather through the primary provider, then the fallback.
    pub async fn get_current_weather(
        &self,
        request: &WeatherRequest,
    ) -> Result<UnifiedWeatherResponse, WeatherError> {
        let coordinators = self.coordinators()?;
        let primary_error = match coordinators.primary.execute(request).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        let Some(fallback) = &coordinators.fallback else {
            return Err(primary_error);
        };

        let from = coordinators.primary.provider().kind().as_str();
        let to = fallback.provider().kind().as_str();
        tracing::warn!(
            from,
            to,
            error_code = primary_error.code(),
            error = %primary_error,
            "primary provider failed, trying fallback"
        );
        self.metrics
            .increment_counter(FALLBACK_TOTAL, &[("from", from), ("to", to)]);

        fallback.execute(request).await.map_err(|e| {
            tracing::error!(provider = to, error_code = e.code(), error = %e, "fallback provider failed");
            e
        })
    }

    /// Check the primary upstream directly and merge in breaker and cache state.
    pub async fn health_check(&self) -> ServiceHealth {
        let Ok(coordinators) = self.coordinators() else {
            return ServiceHealth {
                healthy: false,
                provider: self.config.provider,
                is_stale: false,
                response_time_ms: 0,
                error: Some("weather service is not initialized".into()),
                circuit_state: CircuitState::Closed,
                cache_entries: 0,
                fallback_provider: self.config.fallback_provider,
                fallback: None,
                metrics: self.metrics.summary(),
            };
        };

        let upstream = coordinators.primary.provider().health_check().await;
        let summary = coordinators.primary.summary();
        let circuit_state = summary.circuit.state;
        let healthy = upstream.healthy && circuit_state != CircuitState::Open;
        if !healthy {
            tracing::warn!(
                provider = %summary.provider,
                circuit_state = %circuit_state,
                error = upstream.error.as_deref().unwrap_or(""),
                "weather provider unhealthy"
            );
        }

        ServiceHealth {
            healthy,
            provider: summary.provider,
            is_stale: summary.last_served_stale,
            response_time_ms: upstream.response_time_ms,
            error: upstream.error,
            circuit_state,
            cache_entries: summary.cache_entries,
            fallback_provider: coordinators.fallback.as_ref().map(|f| f.provider().kind()),
            fallback: coordinators.fallback.as_ref().map(ResilienceCoordinator::summary),
            metrics: self.metrics.summary(),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn get_provider_capabilities(&self) -> Result<ProviderCapabilities, WeatherError> {
        let coordinators = self.coordinators()?;
        Ok(ProviderCapabilities {
            active: coordinators.primary.provider().capabilities(),
            fallback: coordinators
                .fallback
                .as_ref()
                .map(|f| f.provider().capabilities()),
        })
    }

    #[must_use]
    pub fn default_location(&self) -> Coordinates {
        self.config.default_location
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Drop expired cache entries for every provider.
    pub fn sweep_caches(&self) -> usize {
        self.coordinators.get().map_or(0, |c| {
            c.primary.sweep_cache() + c.fallback.as_ref().map_or(0, ResilienceCoordinator::sweep_cache)
        })
    }

    /// Clear metrics, caches and breaker state.
    #[cfg(feature = "admin")]
    pub fn reset(&self) {
        self.metrics.reset();
        if let Some(c) = self.coordinators.get() {
            c.primary.reset();
            if let Some(fallback) = &c.fallback {
                fallback.reset();
            }
        }
        tracing::warn!("weather metrics, caches and circuit breakers reset");
    }
}
