//! Analysis configuration
//!
//! Loaded from a TOML file, then overridden by environment variables.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`RESOLVE_DIAGNOSTICS_LOG`,
//!    `RESOLVE_DIAGNOSTICS_SHORT_ID_LENGTH`)
//! 2. Config file
//! 3. Defaults

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::model::DEFAULT_SHORT_ID_LENGTH;

pub const ENV_LOG_FILTER: &str = "RESOLVE_DIAGNOSTICS_LOG";
pub const ENV_SHORT_ID_LENGTH: &str = "RESOLVE_DIAGNOSTICS_SHORT_ID_LENGTH";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Hex digits shown for ids in log lines
    pub short_id_length: usize,

    /// Subscribe the out-of-order disposal detector
    pub detect_out_of_order_disposal: bool,

    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            short_id_length: DEFAULT_SHORT_ID_LENGTH,
            detect_out_of_order_disposal: true,
            log_filter: "info".to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| AnalysisError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Merge with environment variables
    ///
    /// Unparseable numeric overrides are ignored.
    pub fn with_env(mut self) -> Self {
        if let Ok(filter) = std::env::var(ENV_LOG_FILTER) {
            if !filter.trim().is_empty() {
                self.log_filter = filter;
            }
        }
        if let Ok(len) = std::env::var(ENV_SHORT_ID_LENGTH) {
            match len.trim().parse() {
                Ok(len) => self.short_id_length = len,
                Err(_) => tracing::warn!(value = %len, "ignoring invalid {}", ENV_SHORT_ID_LENGTH),
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=32).contains(&self.short_id_length) {
            return Err(AnalysisError::InvalidConfig {
                reason: format!(
                    "short_id_length must be between 1 and 32, got {}",
                    self.short_id_length
                ),
            });
        }
        if self.log_filter.trim().is_empty() {
            return Err(AnalysisError::InvalidConfig {
                reason: "log_filter must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
