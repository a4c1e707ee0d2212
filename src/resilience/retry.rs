//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::model::RetryPolicy;
use crate::error::WeatherError;

/// Upper bound of the random jitter, as a fraction of the backoff delay.
pub const MAX_JITTER: f64 = 0.1;

/// Delay to wait after attempt `attempt` (1-based) has failed:
/// `min(base * 2^(attempt-1), max) * (1 + jitter)`.
#[must_use]
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32, jitter: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let backoff = policy
        .base_delay
        .saturating_mul(1u32 << exponent)
        .min(policy.max_delay);
    let factor = 1.0 + jitter.clamp(0.0, MAX_JITTER);
    Duration::try_from_secs_f64(backoff.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Outcome of [`retry_with_backoff`], carrying how many retries were made.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, WeatherError>,
    pub retries: u32,
}

/// Run `op` up to `policy.retries + 1` times.
///
/// `op` receives the 1-based attempt number. Non-retryable errors end the
/// loop immediately; the last error is returned once attempts run out.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    provider: &str,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, WeatherError>>,
{
    let max_attempts = policy.retries.saturating_add(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    retries: attempt - 1,
                };
            }
            Err(e) if !e.is_retryable() || attempt >= max_attempts => {
                return RetryOutcome {
                    result: Err(e),
                    retries: attempt - 1,
                };
            }
            Err(e) => {
                let jitter = rand::thread_rng().gen_range(0.0..=MAX_JITTER);
                let delay = backoff_delay(policy, attempt, jitter);
                tracing::warn!(
                    provider,
                    attempt,
                    error_code = e.code(),
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "upstream call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
