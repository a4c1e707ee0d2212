//! Configuration loading and validation.
//!
//! Weather configuration is environment-style: [`load_from_env`] snapshots
//! the process environment and hands it to [`validation::validate`], which
//! produces the typed [`model::Config`]. Config errors are fatal at startup.

pub mod model;
pub mod validation;

use std::collections::HashMap;

use crate::error::WeathergateError;
use model::Config;

/// Snapshot the process environment as a plain map.
#[must_use]
pub fn env_snapshot() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Parse and validate configuration from an environment map.
pub fn load(env: &HashMap<String, String>) -> Result<Config, WeathergateError> {
    validation::validate(env).map_err(|errors| WeathergateError::ConfigValidation { errors })
}

/// Parse and validate configuration from the process environment.
pub fn load_from_env() -> Result<Config, WeathergateError> {
    load(&env_snapshot())
}
