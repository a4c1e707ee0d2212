//! HTTP plumbing shared by every adapter.
//!
//! [`get_json`] issues a bounded GET through the pooled hyper client,
//! classifies the upstream status into a [`WeatherError`], and decodes
//! the body. [`timed_health`] times a health fetch under its own deadline.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::StatusCode;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use url::Url;

use super::{ProviderHealth, ProviderKind};
use crate::error::WeatherError;
use crate::model::UnifiedWeatherResponse;
use crate::server::HttpClient;

/// Largest upstream body accepted before the response is abandoned.
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Map an upstream status to the shared taxonomy.
///
/// 429 is rate limiting, any other 4xx is a credential or parameter
/// problem, everything else non-2xx is an upstream failure.
#[must_use]
pub fn classify_status(provider: ProviderKind, status: StatusCode, body: &str) -> WeatherError {
    let detail = truncate_body(body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        WeatherError::RateLimit(format!("{provider} rate limit exceeded"))
    } else if status.is_client_error() {
        WeatherError::BadRequest(format!("{provider} rejected the request ({status}): {detail}"))
    } else {
        WeatherError::Upstream(format!("{provider} returned {status}: {detail}"))
    }
}

/// GET `url` and decode a JSON body, bounded by `timeout`.
pub async fn get_json<T: DeserializeOwned>(
    client: &HttpClient,
    provider: ProviderKind,
    url: &Url,
    headers: &[(&str, String)],
    timeout: Duration,
) -> Result<T, WeatherError> {
    let mut builder = hyper::Request::builder()
        .method(hyper::Method::GET)
        .uri(url.as_str())
        .header(hyper::header::ACCEPT, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }
    let request = builder
        .body(Full::new(Bytes::new()))
        .map_err(|e| WeatherError::BadRequest(format!("invalid {provider} request: {e}")))?;

    // The deadline covers connect, headers, and body so a slow upstream
    // cannot hang the caller.
    let exchange = async {
        let response = client
            .request(request)
            .await
            .map_err(|e| WeatherError::Upstream(format!("{provider} connection failed: {e}")))?;
        let status = response.status();
        let body = Limited::new(response.into_body(), MAX_BODY_BYTES)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    WeatherError::Upstream(format!(
                        "{provider} response exceeded {MAX_BODY_BYTES} bytes"
                    ))
                } else {
                    WeatherError::Upstream(format!("{provider} body read failed: {e}"))
                }
            })?
            .to_bytes();
        Ok::<_, WeatherError>((status, body))
    };

    let (status, body) = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| {
            WeatherError::Upstream(format!(
                "{provider} timed out after {}ms",
                timeout.as_millis()
            ))
        })??;

    if !status.is_success() {
        return Err(classify_status(
            provider,
            status,
            &String::from_utf8_lossy(&body),
        ));
    }

    serde_json::from_slice(&body)
        .map_err(|e| WeatherError::Upstream(format!("{provider} returned malformed data: {e}")))
}

/// Run a health fetch under `timeout` and report how it went.
#[allow(clippy::cast_possible_truncation)]
pub async fn timed_health<F>(timeout: Duration, fetch: F) -> ProviderHealth
where
    F: Future<Output = Result<UnifiedWeatherResponse, WeatherError>>,
{
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, fetch).await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(_)) => ProviderHealth {
            healthy: true,
            response_time_ms,
            error: None,
        },
        Ok(Err(e)) => ProviderHealth {
            healthy: false,
            response_time_ms,
            error: Some(e.to_string()),
        },
        Err(_) => ProviderHealth {
            healthy: false,
            response_time_ms,
            error: Some(format!(
                "health check timed out after {}ms",
                timeout.as_millis()
            )),
        },
    }
}

/// Join a configured base URL with a path, preserving any base path.
pub fn endpoint(base_url: &str, path: &str) -> Result<Url, WeatherError> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| WeatherError::BadRequest(format!("invalid endpoint '{joined}': {e}")))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
