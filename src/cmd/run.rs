//! `weathergate run`: start the weather server.
//!
//! Validates configuration from the environment, initializes the weather
//! service (signing key errors are fatal here), starts the Axum HTTP
//! server with graceful shutdown, and spawns a background cache sweep
//! loop that stops with the server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::config;
use crate::error::WeathergateError;
use crate::logging;
use crate::server::{self, AppState};
use crate::service::WeatherService;

pub async fn execute(args: RunArgs) -> Result<(), WeathergateError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let config = Arc::new(config::load_from_env()?);
    let sweep_interval = config.resilience.cache.sweep_interval;

    let service = Arc::new(WeatherService::new(
        Arc::clone(&config),
        server::build_http_client(),
    ));
    service.initialize().await?;

    let state = Arc::new(AppState::new(Arc::clone(&service)));

    // Shutdown signal: sending on shutdown_tx stops the sweep loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweep_handle = tokio::spawn(cache_sweep_loop(service, sweep_interval, shutdown_rx));

    let router = server::build_router(state);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        provider = %config.provider,
        fallback = ?config.fallback_provider.map(|k| k.as_str()),
        "weathergate started"
    );

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful_shutdown)
        .await?;

    // Wait for the sweep task to finish (catches panics)
    if let Err(e) = sweep_handle.await {
        tracing::error!(error = %e, "cache sweep task failed");
    }

    tracing::info!("weathergate stopped");
    Ok(())
}

/// Periodically drop cache entries past their stale window until shutdown.
pub async fn cache_sweep_loop(
    service: Arc<WeatherService>,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("cache sweep loop shutting down");
                return;
            }
        }

        let removed = service.sweep_caches();
        if removed > 0 {
            tracing::info!(removed, "expired weather cache entries removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sweep_loop_stops_on_shutdown() {
        let env: HashMap<String, String> =
            HashMap::from([("WEATHER_PROVIDER".to_string(), "open-meteo".to_string())]);
        let config = Arc::new(config::load(&env).unwrap());
        let service = Arc::new(WeatherService::new(config, server::build_http_client()));

        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(cache_sweep_loop(service, Duration::from_secs(60), rx));

        tokio::time::advance(Duration::from_secs(130)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
