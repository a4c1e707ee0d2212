//! Sliding-window circuit breaker.
//!
//! - **Closed**: calls pass; failures are timestamped and pruned to
//!   `time_window`. Reaching `failure_threshold` opens the circuit.
//! - **Open**: calls are refused until `open_until`.
//! - **HalfOpen**: entered by the first check at or after `open_until`.
//!   A success closes the circuit and clears history, a failure reopens it.
//!
//! Concurrent half-open trial calls are not coordinated: every caller that
//! checks while half-open is admitted.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::model::CircuitBreakerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: VecDeque<Instant>,
    open_until: Option<Instant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub recent_failures: usize,
    /// Remaining open time, when open.
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    settings: CircuitBreakerSettings,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                open_until: None,
            }),
        }
    }

    /// Whether a call may proceed. Moves Open to HalfOpen once the open
    /// period has elapsed.
    pub fn can_execute(&self) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if inner.open_until.is_some_and(|until| now >= until) {
                    inner.state = CircuitState::HalfOpen;
                    inner.open_until = None;
                    tracing::info!("circuit breaker half-open, admitting trial call");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            tracing::info!("circuit breaker closed after successful trial call");
            inner.failures.clear();
        }
        inner.state = CircuitState::Closed;
        inner.open_until = None;
    }

    pub fn record_failure(&self) {
        let now = Instant::now();
        let window = self.settings.time_window;
        let mut inner = self.inner.lock();

        inner.failures.push_back(now);
        while inner
            .failures
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) > window)
        {
            inner.failures.pop_front();
        }

        let threshold = self.settings.failure_threshold as usize;
        let should_open = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failures.len() >= threshold,
            CircuitState::Open => false,
        };

        if should_open {
            inner.state = CircuitState::Open;
            // An unrepresentable deadline keeps the circuit open until reset
            inner.open_until = now.checked_add(self.settings.open_duration);
            tracing::warn!(
                failures = inner.failures.len(),
                open_for_ms = self.settings.open_duration.as_millis() as u64,
                "circuit breaker opened"
            );
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = Instant::now();
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: inner.state,
            recent_failures: inner
                .failures
                .iter()
                .filter(|t| now.saturating_duration_since(**t) <= self.settings.time_window)
                .count(),
            retry_after_ms: inner
                .open_until
                .map(|until| until.saturating_duration_since(now).as_millis() as u64),
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failures.clear();
        inner.open_until = None;
    }
}
