//! Integration tests for the HTTP surface, health endpoints, and graceful shutdown.

mod common;

use common::{config, service, start_server, SpyProvider};
use weathergate::api::{ErrorBody, CORRELATION_HEADER};
use weathergate::error::WeatherError;
use weathergate::health::HealthResponse;
use weathergate::model::UnifiedWeatherResponse;
use weathergate::provider::ProviderKind;

#[tokio::test]
async fn health_endpoint_returns_healthy() {
    let primary = SpyProvider::new(ProviderKind::OpenMeteo, 23);
    let (addr, shutdown) = start_server(service(config(&[]), &primary, None)).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let health: HealthResponse = resp.json().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.provider, ProviderKind::OpenMeteo);
    assert!(health.fallback_provider.is_none());
    assert!(health.initialized);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn weather_uses_default_location_and_echoes_correlation_id() {
    let primary = SpyProvider::new(ProviderKind::OpenMeteo, 23);
    let (addr, shutdown) = start_server(service(config(&[]), &primary, None)).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/weather"))
        .header(CORRELATION_HEADER, "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()[CORRELATION_HEADER], "req-42");

    let weather: UnifiedWeatherResponse = resp.json().await.unwrap();
    assert_eq!(weather.current.temp, 23);
    assert_eq!(weather.current.humidity, 65);
    assert_eq!(weather.provider, "open-meteo");
    assert!(!weather.is_stale);

    // Second call inside the fresh TTL is served from cache
    let resp = reqwest::get(format!("http://{addr}/weather?lat=32.29&lon=-64.78"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key(CORRELATION_HEADER));
    assert_eq!(primary.calls(), 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn malformed_query_is_bad_request() {
    let primary = SpyProvider::new(ProviderKind::OpenMeteo, 23);
    let (addr, shutdown) = start_server(service(config(&[]), &primary, None)).await;

    for query in ["lat=north", "lat=95", "lon=200", "units=kelvin"] {
        let resp = reqwest::get(format!("http://{addr}/weather?{query}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "query {query}");
        let body: ErrorBody = resp.json().await.unwrap();
        assert_eq!(body.error, "BAD_REQUEST");
    }
    assert_eq!(primary.calls(), 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn upstream_failures_map_to_status_codes() {
    let primary = SpyProvider::new(ProviderKind::OpenMeteo, 23);
    let (addr, shutdown) = start_server(service(config(&[]), &primary, None)).await;

    primary.fail_with(Some(WeatherError::RateLimit("slow down".into())));
    let resp = reqwest::get(format!("http://{addr}/weather?lat=1&lon=1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
    let body: ErrorBody = resp.json().await.unwrap();
    assert_eq!(body.error, "RATE_LIMIT");

    primary.fail_with(Some(WeatherError::Upstream("down".into())));
    let resp = reqwest::get(format!("http://{addr}/weather?lat=2&lon=2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: ErrorBody = resp.json().await.unwrap();
    assert_eq!(body.error, "UPSTREAM_ERROR");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn weather_health_reports_open_circuit_as_unavailable() {
    let primary = SpyProvider::new(ProviderKind::OpenMeteo, 23);
    let svc = service(config(&[("WEATHER_CB_FAILURE_THRESHOLD", "1")]), &primary, None);
    let (addr, shutdown) = start_server(svc).await;

    let resp = reqwest::get(format!("http://{addr}/weather/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["healthy"], true);
    assert_eq!(body["provider"], "open-meteo");
    assert_eq!(body["circuit_state"], "CLOSED");
    assert_eq!(body["is_stale"], false);

    primary.fail_with(Some(WeatherError::Upstream("down".into())));
    let resp = reqwest::get(format!("http://{addr}/weather")).await.unwrap();
    assert_eq!(resp.status(), 502);

    // The upstream check itself still succeeds, but the open circuit wins
    let resp = reqwest::get(format!("http://{addr}/weather/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["healthy"], false);
    assert_eq!(body["circuit_state"], "OPEN");
    assert_eq!(body["metrics"]["errors"], 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn metrics_endpoint_formats() {
    let primary = SpyProvider::new(ProviderKind::OpenMeteo, 23);
    let (addr, shutdown) = start_server(service(config(&[]), &primary, None)).await;

    reqwest::get(format!("http://{addr}/weather")).await.unwrap();
    reqwest::get(format!("http://{addr}/weather")).await.unwrap();

    let resp = reqwest::get(format!("http://{addr}/weather/metrics"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain; version=0.0.4"));
    let text = resp.text().await.unwrap();
    assert!(text.contains("# TYPE weather_requests_total counter"));
    assert!(text.contains("weather_requests_total{outcome=\"fresh\",provider=\"open-meteo\"} 1"));
    assert!(text.contains("weather_requests_total{outcome=\"cache_hit\",provider=\"open-meteo\"} 1"));
    assert!(text.contains("# TYPE weather_upstream_duration_ms histogram"));

    let resp = reqwest::get(format!("http://{addr}/weather/metrics?format=json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["counters"].as_array().is_some_and(|c| !c.is_empty()));
    assert!(body["histograms"].is_array());

    let resp = reqwest::get(format!("http://{addr}/weather/metrics?format=xml"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn capabilities_endpoint_lists_active_and_fallback() {
    let primary = SpyProvider::new(ProviderKind::OpenMeteo, 23);
    let fallback = SpyProvider::new(ProviderKind::OpenWeather, 19);
    let svc = service(
        config(&[
            ("WEATHER_FALLBACK_PROVIDER", "openweather"),
            ("OPENWEATHER_API_KEY", "test-key"),
        ]),
        &primary,
        Some(&fallback),
    );
    let (addr, shutdown) = start_server(svc).await;

    let resp = reqwest::get(format!("http://{addr}/weather/capabilities"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["active"]["provider_name"], "open-meteo");
    assert_eq!(body["active"]["requires_api_key"], false);
    assert_eq!(body["fallback"]["provider_name"], "openweather");

    let _ = shutdown.send(());
}

#[cfg(not(feature = "admin"))]
#[tokio::test]
async fn admin_reset_is_not_routed_by_default() {
    let primary = SpyProvider::new(ProviderKind::OpenMeteo, 23);
    let (addr, shutdown) = start_server(service(config(&[]), &primary, None)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/weather/admin/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn graceful_shutdown_stops_server() {
    let primary = SpyProvider::new(ProviderKind::OpenMeteo, 23);
    let (addr, shutdown) = start_server(service(config(&[]), &primary, None)).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let _ = shutdown.send(());
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let result = reqwest::get(format!("http://{addr}/health")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn health_command_reflects_instance_state() {
    use weathergate::cli::HealthArgs;
    use weathergate::cmd::health;
    use weathergate::error::WeathergateError;

    let primary = SpyProvider::new(ProviderKind::OpenMeteo, 23);
    let (addr, shutdown) = start_server(service(config(&[]), &primary, None)).await;
    let args = || HealthArgs {
        url: format!("http://{addr}/"),
        json: false,
    };

    health::execute(args()).await.unwrap();

    primary.set_healthy(false);
    let err = health::execute(args()).await.unwrap_err();
    assert!(matches!(err, WeathergateError::HealthCheckFailed(status) if status == 503));

    let _ = shutdown.send(());
}
