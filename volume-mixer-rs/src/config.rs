//! Engine configuration.
//!
//! Read from a JSON blob handed over by the host. Every field is optional.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Refresh interval must be greater than zero")]
    ZeroRefreshInterval,

    #[error("Volume step must be a positive number, got {0}")]
    InvalidVolumeStep(f32),

    #[error("No application selected")]
    MissingAppName,

    #[error("No {0} device selected")]
    MissingDevice(&'static str),

    #[error("Toggle mode needs two different {0} devices")]
    ToggleNeedsTwoDevices(&'static str),
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log filter directive, e.g. "info" or "volume_mixer_rs=debug"
    pub log_level: Option<String>,

    /// Period of the background refresh timer
    pub refresh_interval_ms: u64,

    /// Points added or removed by the volume up/down actions
    pub volume_step: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            refresh_interval_ms: 2000,
            volume_step: 5.0,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        if !self.volume_step.is_finite() || self.volume_step <= 0.0 {
            return Err(ConfigError::InvalidVolumeStep(self.volume_step));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}
