//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and orderings
//! - Check cross-field constraints (request timeout vs long-poll bound)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use serde_json::json;
use thiserror::Error;

use crate::config::schema::{ServerConfig, StorageBackend};
use crate::palette::model::Palette;
use crate::palette::rules::PaletteRules;
use crate::palette::validator;

/// A single semantic problem with a config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("palette.supported_colors must not be empty")]
    EmptyAllowList,

    #[error("palette.supported_colors entry '{0}' is not a six-digit hex color")]
    InvalidColor(String),

    #[error("palette.{field}: minimum {min} exceeds maximum {max}")]
    InvertedBounds {
        field: &'static str,
        min: u64,
        max: u64,
    },

    #[error("palette.max_colors must be at least 1")]
    NoColorsAllowed,

    #[error("long_poll.max_wait_ms must be greater than zero")]
    ZeroWait,

    #[error("timeouts.request_secs ({request_secs}s) must exceed long_poll.max_wait_ms ({max_wait_ms}ms)")]
    TimeoutTooShort { request_secs: u64, max_wait_ms: u64 },

    #[error("storage.path is required for the file backend")]
    MissingStoragePath,

    #[error("built-in default palette violates the configured rules: {0}")]
    DefaultRejected(String),
}

/// Validate `config`, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let palette = &config.palette;
    if palette.supported_colors.is_empty() {
        errors.push(ValidationError::EmptyAllowList);
    }
    for color in &palette.supported_colors {
        if !is_hex_color(color.trim()) {
            errors.push(ValidationError::InvalidColor(color.clone()));
        }
    }
    if palette.min_colors > palette.max_colors {
        errors.push(ValidationError::InvertedBounds {
            field: "min_colors",
            min: palette.min_colors as u64,
            max: palette.max_colors as u64,
        });
    }
    if palette.max_colors == 0 {
        errors.push(ValidationError::NoColorsAllowed);
    }
    if palette.min_duration_ms > palette.max_duration_ms {
        errors.push(ValidationError::InvertedBounds {
            field: "min_duration_ms",
            min: u64::from(palette.min_duration_ms),
            max: u64::from(palette.max_duration_ms),
        });
    }

    let max_wait_ms = config.long_poll.max_wait_ms;
    if max_wait_ms == 0 {
        errors.push(ValidationError::ZeroWait);
    }
    if config.timeouts.request_secs.saturating_mul(1000) <= max_wait_ms {
        errors.push(ValidationError::TimeoutTooShort {
            request_secs: config.timeouts.request_secs,
            max_wait_ms,
        });
    }

    if config.storage.backend == StorageBackend::File && config.storage.path.is_none() {
        errors.push(ValidationError::MissingStoragePath);
    }

    // The default bypasses validation when materialized, so it has to be
    // acceptable under whatever rules are configured.
    if errors.is_empty() {
        let default = Palette::builtin_default();
        let payload = json!({
            "colors": default.colors,
            "display_duration_ms": default.display_duration_ms,
            "fadeout_duration_ms": default.fadeout_duration_ms,
        });
        if let Err(rejection) = validator::validate(&payload, &PaletteRules::from(palette)) {
            errors.push(ValidationError::DefaultRejected(rejection.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_hex_color(token: &str) -> bool {
    token.len() == 6 && token.chars().all(|c| c.is_ascii_hexdigit())
}
