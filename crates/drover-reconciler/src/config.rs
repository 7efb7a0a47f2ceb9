use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_SLEEP_MS: u64 = 3_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Knobs for plan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Skip the Sleep operation's pause. Used by tests and deployments
    /// whose hosts index synchronously.
    #[serde(default)]
    pub skip_sleep: bool,
    /// How long Sleep pauses to let host indexing settle before a Sync.
    #[serde(default = "default_sleep_ms")]
    pub sleep_ms: u64,
}

fn default_sleep_ms() -> u64 {
    DEFAULT_SLEEP_MS
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            skip_sleep: false,
            sleep_ms: DEFAULT_SLEEP_MS,
        }
    }
}

impl ExecutorConfig {
    pub fn sleep_duration(&self) -> Duration {
        Duration::from_millis(self.sleep_ms)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }
}
