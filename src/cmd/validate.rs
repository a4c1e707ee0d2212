//! `weathergate validate`: check the weather configuration for errors.
//!
//! Parses and validates the process environment, reporting results in
//! either human-readable text or machine-readable JSON format.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::{self, validation};
use crate::error::WeathergateError;

pub fn execute(args: &ValidateArgs) -> Result<(), WeathergateError> {
    let env = config::env_snapshot();

    let config = match validation::validate(&env) {
        Ok(config) => config,
        Err(errors) => {
            match args.format {
                ValidateFormat::Text => {
                    eprintln!("\u{2717} configuration has {} errors\n", errors.len());
                    for error in &errors {
                        eprintln!("{error}");
                    }
                }
                ValidateFormat::Json => {
                    let json_errors: Vec<serde_json::Value> = errors
                        .iter()
                        .map(|e| {
                            serde_json::json!({
                                "variable": e.variable,
                                "message": e.message,
                                "suggestion": e.suggestion,
                            })
                        })
                        .collect();
                    println!(
                        "{}",
                        serde_json::json!({
                            "valid": false,
                            "errors": json_errors,
                        })
                    );
                }
            }
            return Err(WeathergateError::ConfigValidation { errors });
        }
    };

    match args.format {
        ValidateFormat::Text => {
            println!("\u{2713} {}", validation::format_validation_report(&config));
        }
        ValidateFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "provider": config.provider,
                    "fallback_provider": config.fallback_provider,
                    "default_location": config.default_location,
                    "resilience": config.resilience,
                })
            );
        }
    }

    Ok(())
}
