//! Tracing subscriber setup for processes embedding the analysis

use tracing_subscriber::EnvFilter;

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};

/// Filter from `RUST_LOG` when set, otherwise from the config
pub fn env_filter(config: &AnalysisConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_filter).map_err(|e| AnalysisError::LoggingInit {
        reason: format!("invalid log filter '{}': {}", config.log_filter, e),
    })
}

/// Install a global fmt subscriber (fails if one is already installed)
pub fn init(config: &AnalysisConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .with_target(true)
        .try_init()
        .map_err(|e| AnalysisError::LoggingInit {
            reason: e.to_string(),
        })
}
