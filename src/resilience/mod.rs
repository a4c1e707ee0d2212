//! Cache, circuit breaker and retry around a single provider.
//!
//! [`ResilienceCoordinator::execute`] walks one logical call through:
//!
//! 1. fresh cache hit, returned without touching the breaker
//! 2. open circuit, served from stale cache or failed without a network call
//! 3. provider call through [`retry::retry_with_backoff`]
//! 4. success, recorded in the breaker and stored in the cache
//! 5. exhausted retries, recorded as a breaker failure, then stale cache or the error
//!
//! Concurrent misses for the same key are not coalesced; each one reaches
//! the upstream and the last write to the cache wins.

pub mod cache;
pub mod circuit_breaker;
pub mod retry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;

use self::cache::{CacheLookup, WeatherCache};
use self::circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
use self::retry::retry_with_backoff;
use crate::config::model::ResilienceSettings;
use crate::error::WeatherError;
use crate::metrics::{
    MetricsCollector, CACHE_ENTRIES, CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, CIRCUIT_STATE,
    REQUESTS_TOTAL, RETRIES_TOTAL, UPSTREAM_CALLS_TOTAL, UPSTREAM_DURATION_MS,
};
use crate::model::{UnifiedWeatherResponse, WeatherRequest};
use crate::provider::{ProviderKind, WeatherProvider};

/// Breaker and cache state for one provider, as reported by health checks.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorSummary {
    pub provider: ProviderKind,
    pub circuit: BreakerSnapshot,
    pub cache_entries: usize,
    pub last_served_stale: bool,
}

pub struct ResilienceCoordinator {
    provider: Arc<dyn WeatherProvider>,
    settings: ResilienceSettings,
    cache: WeatherCache,
    breaker: CircuitBreaker,
    metrics: Arc<MetricsCollector>,
    last_served_stale: AtomicBool,
}

impl ResilienceCoordinator {
    #[must_use]
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        settings: ResilienceSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let coordinator = Self {
            cache: WeatherCache::new(settings.cache),
            breaker: CircuitBreaker::new(settings.circuit_breaker),
            provider,
            settings,
            metrics,
            last_served_stale: AtomicBool::new(false),
        };
        coordinator.publish_gauges();
        coordinator
    }

    pub async fn execute(
        &self,
        request: &WeatherRequest,
    ) -> Result<UnifiedWeatherResponse, WeatherError> {
        let provider = self.provider.kind().as_str();
        let key = request.cache_key(provider);

        if let CacheLookup::Fresh(value) = self.cache.lookup(&key) {
            tracing::debug!(provider, cache_key = %key, "serving fresh cache entry");
            self.metrics
                .increment_counter(CACHE_HITS_TOTAL, &[("provider", provider), ("freshness", "fresh")]);
            self.record_outcome("cache_hit", false);
            return Ok(value);
        }

        if !self.breaker.can_execute() {
            self.publish_gauges();
            tracing::warn!(provider, cache_key = %key, "circuit open, skipping upstream call");
            let error =
                WeatherError::Upstream(format!("{provider} circuit is open; no cached data available"));
            return self.serve_stale_or(&key, error);
        }
        self.publish_gauges();
        self.metrics
            .increment_counter(CACHE_MISSES_TOTAL, &[("provider", provider)]);

        let outcome = retry_with_backoff(&self.settings.retry, provider, |attempt| async move {
            let started = Instant::now();
            let result = self.provider.fetch_weather(request, attempt).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.metrics
                .record_histogram(UPSTREAM_DURATION_MS, elapsed_ms, &[("provider", provider)]);
            let label = result.as_ref().map_or_else(WeatherError::code, |_| "ok");
            self.metrics.increment_counter(
                UPSTREAM_CALLS_TOTAL,
                &[("provider", provider), ("result", label)],
            );
            result
        })
        .await;

        if outcome.retries > 0 {
            self.metrics.add_counter(
                RETRIES_TOTAL,
                f64::from(outcome.retries),
                &[("provider", provider)],
            );
        }

        match outcome.result {
            Ok(mut value) => {
                self.breaker.record_success();
                value.is_stale = false;
                self.cache.store(&key, value.clone());
                self.publish_gauges();
                self.record_outcome("fresh", false);
                Ok(value)
            }
            Err(error) => {
                self.breaker.record_failure();
                self.publish_gauges();
                tracing::warn!(
                    provider,
                    cache_key = %key,
                    error_code = error.code(),
                    error = %error,
                    "upstream call failed after retries"
                );
                self.serve_stale_or(&key, error)
            }
        }
    }

    fn serve_stale_or(
        &self,
        key: &str,
        error: WeatherError,
    ) -> Result<UnifiedWeatherResponse, WeatherError> {
        let provider = self.provider.kind().as_str();
        match self.cache.lookup(key) {
            // A concurrent call may have refreshed the entry meanwhile
            CacheLookup::Fresh(value) => {
                self.metrics
                    .increment_counter(CACHE_HITS_TOTAL, &[("provider", provider), ("freshness", "fresh")]);
                self.record_outcome("cache_hit", false);
                Ok(value)
            }
            CacheLookup::Stale(value) => {
                tracing::info!(provider, cache_key = %key, "serving stale cache entry");
                self.metrics
                    .increment_counter(CACHE_HITS_TOTAL, &[("provider", provider), ("freshness", "stale")]);
                self.record_outcome("stale", true);
                Ok(value)
            }
            CacheLookup::Miss => {
                self.publish_gauges();
                self.metrics
                    .increment_counter(REQUESTS_TOTAL, &[("provider", provider), ("outcome", "error")]);
                Err(error)
            }
        }
    }

    fn record_outcome(&self, outcome: &str, stale: bool) {
        self.last_served_stale.store(stale, Ordering::Relaxed);
        self.metrics.increment_counter(
            REQUESTS_TOTAL,
            &[("provider", self.provider.kind().as_str()), ("outcome", outcome)],
        );
    }

    #[allow(clippy::cast_precision_loss)]
    fn publish_gauges(&self) {
        let labels = [("provider", self.provider.kind().as_str())];
        self.metrics
            .set_gauge(CIRCUIT_STATE, self.breaker.state().as_gauge(), &labels);
        self.metrics
            .set_gauge(CACHE_ENTRIES, self.cache.len() as f64, &labels);
    }

    /// Drop cache entries past their stale window.
    pub fn sweep_cache(&self) -> usize {
        let removed = self.cache.sweep();
        if removed > 0 {
            tracing::debug!(
                provider = self.provider.kind().as_str(),
                removed,
                "swept expired cache entries"
            );
        }
        self.publish_gauges();
        removed
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn WeatherProvider> {
        &self.provider
    }

    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    #[must_use]
    pub fn summary(&self) -> CoordinatorSummary {
        CoordinatorSummary {
            provider: self.provider.kind(),
            circuit: self.breaker.snapshot(),
            cache_entries: self.cache.len(),
            last_served_stale: self.last_served_stale.load(Ordering::Relaxed),
        }
    }

    /// Clear cache and breaker state.
    pub fn reset(&self) {
        self.cache.clear();
        self.breaker.reset();
        self.last_served_stale.store(false, Ordering::Relaxed);
        self.publish_gauges();
    }
}
