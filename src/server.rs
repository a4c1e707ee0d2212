//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the weather
//! service and uptime), [`build_router`] for the HTTP surface,
//! [`build_http_client`] for the connection-pooled hyper client the
//! providers share, and [`shutdown_signal`] for SIGTERM / Ctrl+C
//! handling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::health::health_handler;
use crate::service::WeatherService;

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub service: Arc<WeatherService>,
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(service: Arc<WeatherService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring`.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/weather", get(api::weather_handler))
        .route("/weather/health", get(api::weather_health_handler))
        .route("/weather/metrics", get(api::weather_metrics_handler))
        .route("/weather/capabilities", get(api::capabilities_handler));

    #[cfg(feature = "admin")]
    let router = router.route(
        "/weather/admin/reset",
        axum::routing::post(api::admin::reset_handler),
    );

    router
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
