//! `weathergate health`: check the weather health of a running instance.
//!
//! Sends a `GET /weather/health` request to the specified URL and
//! displays the response as formatted text or raw JSON. An unhealthy
//! instance (503) is reported and then returned as an error.

use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;

use crate::cli::HealthArgs;
use crate::error::WeathergateError;

/// Subset of the `/weather/health` body shown to the operator.
#[derive(Debug, Deserialize)]
pub struct WeatherHealthReport {
    pub healthy: bool,
    pub provider: String,
    pub is_stale: bool,
    pub response_time_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    pub circuit_state: String,
    pub cache_entries: usize,
    #[serde(default)]
    pub fallback_provider: Option<String>,
}

pub async fn execute(args: HealthArgs) -> Result<(), WeathergateError> {
    let url = format!("{}/weather/health", args.url.trim_end_matches('/'));
    let uri: hyper::Uri =
        url.parse().map_err(
            |e: hyper::http::uri::InvalidUri| WeathergateError::UriParse {
                source: Box::new(e),
            },
        )?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| WeathergateError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(std::time::Duration::from_secs(10), client.request(req))
        .await
        .map_err(|_| WeathergateError::HttpRequest {
            source: "health check timed out after 10s".into(),
        })?
        .map_err(|e| WeathergateError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| WeathergateError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    if args.json {
        println!("{}", String::from_utf8_lossy(&body));
    } else {
        match serde_json::from_slice::<WeatherHealthReport>(&body) {
            Ok(report) => print_report(&args.url, &report),
            Err(e) => {
                eprintln!("Failed to parse health response: {e}");
                println!("{}", String::from_utf8_lossy(&body));
            }
        }
    }

    if !status.is_success() {
        return Err(WeathergateError::HealthCheckFailed(status));
    }
    Ok(())
}

fn print_report(url: &str, report: &WeatherHealthReport) {
    if report.healthy {
        println!("\u{2713} weathergate is healthy ({url})");
    } else {
        println!("\u{2717} weathergate is unhealthy ({url})");
    }
    println!("  provider:       {}", report.provider);
    println!(
        "  fallback:       {}",
        report.fallback_provider.as_deref().unwrap_or("none")
    );
    println!("  circuit:        {}", report.circuit_state);
    println!("  latency:        {}ms", report.response_time_ms);
    println!("  cache entries:  {}", report.cache_entries);
    if report.is_stale {
        println!("  last response:  stale");
    }
    if let Some(ref error) = report.error {
        println!("  error:          {error}");
    }
}
