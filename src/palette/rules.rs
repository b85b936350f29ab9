//! Accepted value ranges for palette writes.
//!
//! These are also the read-only constants exposed to page renderers through
//! `GET /limits`.

use serde::Serialize;

use crate::config::schema::PaletteConfig;

/// The color tokens accepted when no allow-list is configured.
pub const DEFAULT_SUPPORTED_COLORS: [&str; 8] = [
    "000000", "FF0000", "00FF00", "0000FF", "FFFF00", "00FFFF", "FF00FF", "FFFFFF",
];

pub const DEFAULT_MIN_COLORS: usize = 1;
pub const DEFAULT_MAX_COLORS: usize = 10;
pub const DEFAULT_MIN_DURATION_MS: u32 = 0;
pub const DEFAULT_MAX_DURATION_MS: u32 = 4000;

/// Allow-list and numeric bounds a candidate palette must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaletteRules {
    /// Upper-case, in configured order.
    pub supported_colors: Vec<String>,
    pub min_colors: usize,
    pub max_colors: usize,
    pub min_duration_ms: u32,
    pub max_duration_ms: u32,
}

impl PaletteRules {
    /// Case-insensitive allow-list membership.
    pub fn allows(&self, color: &str) -> bool {
        self.supported_colors
            .iter()
            .any(|c| c.eq_ignore_ascii_case(color))
    }

    pub fn color_count_in_range(&self, count: usize) -> bool {
        (self.min_colors..=self.max_colors).contains(&count)
    }

    pub fn duration_in_range(&self, duration_ms: i64) -> bool {
        (i64::from(self.min_duration_ms)..=i64::from(self.max_duration_ms)).contains(&duration_ms)
    }
}

impl Default for PaletteRules {
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

impl From<&PaletteConfig> for PaletteRules {
    fn from(config: &PaletteConfig) -> Self {
        Self {
            supported_colors: config
                .supported_colors
                .iter()
                .map(|c| c.trim().to_ascii_uppercase())
                .collect(),
            min_colors: config.min_colors,
            max_colors: config.max_colors,
            min_duration_ms: config.min_duration_ms,
            max_duration_ms: config.max_duration_ms,
        }
    }
}
