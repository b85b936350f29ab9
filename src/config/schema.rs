//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::palette::rules::{
    PaletteRules, DEFAULT_MAX_COLORS, DEFAULT_MAX_DURATION_MS, DEFAULT_MIN_COLORS,
    DEFAULT_MIN_DURATION_MS, DEFAULT_SUPPORTED_COLORS,
};
use crate::palette::service::ServicePolicy;

/// Root configuration for the palette server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Allow-list and bounds applied to writes.
    pub palette: PaletteConfig,

    /// Hanging read settings.
    pub long_poll: LongPollConfig,

    /// Durable backend selection.
    pub storage: StorageConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// The live-reloadable part of the config.
    pub fn service_policy(&self) -> ServicePolicy {
        ServicePolicy {
            rules: PaletteRules::from(&self.palette),
            max_wait: self.long_poll.max_wait(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Palette rules as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PaletteConfig {
    /// Six-digit hex tokens; case-insensitive.
    pub supported_colors: Vec<String>,
    pub min_colors: usize,
    pub max_colors: usize,
    pub min_duration_ms: u32,
    pub max_duration_ms: u32,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            supported_colors: DEFAULT_SUPPORTED_COLORS.iter().map(|c| c.to_string()).collect(),
            min_colors: DEFAULT_MIN_COLORS,
            max_colors: DEFAULT_MAX_COLORS,
            min_duration_ms: DEFAULT_MIN_DURATION_MS,
            max_duration_ms: DEFAULT_MAX_DURATION_MS,
        }
    }
}

/// Hanging read configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LongPollConfig {
    /// Longest a hanging read is held before answering with the unchanged
    /// value, in milliseconds.
    pub max_wait_ms: u64,
}

impl LongPollConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self { max_wait_ms: 25_000 }
    }
}

/// Which durable backend holds the palette.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Nothing survives a restart.
    #[default]
    Memory,
    /// JSON document at `storage.path`.
    File,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Location of the JSON document for the file backend.
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    /// Must exceed the long-poll bound.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 64 * 1024, // 64KB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
