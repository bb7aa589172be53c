//! Engine settings (`settings.yaml`)
//!
//! ```yaml
//! concurrency: 8
//! call_timeout_secs: 120
//! retry:
//!   max_attempts: 5
//!   initial_delay_ms: 500
//! ```
//!
//! Every field is optional. `STACK_CONCURRENCY` overrides `concurrency`.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "settings.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum provider calls in flight
    pub concurrency: usize,
    /// Per-call deadline in seconds
    pub call_timeout_secs: u64,
    pub retry: RetrySettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            call_timeout_secs: 300,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl EngineSettings {
    /// Loads `./.stackflow/settings.yaml`, else the global one, else defaults.
    /// The environment override is applied last.
    pub fn load() -> Result<Self> {
        let mut settings = match Self::locate()? {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        settings.apply_env()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml(&content)?;
        tracing::debug!(path = %path.display(), "loaded engine settings");
        Ok(settings)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file deserializes to unit, not to a map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn locate() -> Result<Option<PathBuf>> {
        let local = std::env::current_dir()?.join(".stackflow").join(SETTINGS_FILE);
        if local.exists() {
            return Ok(Some(local));
        }
        Ok(dirs::config_dir()
            .map(|dir| dir.join("stackflow").join(SETTINGS_FILE))
            .filter(|path| path.exists()))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("STACK_CONCURRENCY") {
            self.concurrency = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidSetting(format!("STACK_CONCURRENCY={}", value)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidSetting("concurrency must be at least 1".to_string()));
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "call_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidSetting(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::InvalidSetting(
                "retry.multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
