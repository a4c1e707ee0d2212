//! Weathergate is a resilient multi-provider weather service.
//!
//! It normalizes responses from several upstream weather providers into a
//! single shape and wraps every upstream call with a response cache that
//! can serve stale data, a sliding-window circuit breaker, and retry with
//! exponential backoff. A fallback provider can take over when the
//! primary fails.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- Environment-style configuration parsing and validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`model`] -- Request and unified response types plus shared mapping rules.
//! - [`provider`] -- Upstream adapters behind the
//!   [`WeatherProvider`](provider::WeatherProvider) trait, and the WeatherKit
//!   token signer.
//! - [`resilience`] -- Cache, circuit breaker and retry around one provider.
//! - [`metrics`] -- Counters, gauges and histograms with Prometheus export.
//! - [`service`] -- The orchestrator holding primary and fallback providers.
//! - [`api`] -- `/weather` HTTP handlers.
//! - [`health`] -- `GET /health` process liveness handler.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`server`] -- Axum server setup, shared application state, HTTP client, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `admin` | `POST /weather/admin/reset` for clearing metrics, caches and breakers |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod provider;
pub mod resilience;
pub mod server;
pub mod service;
