//! Driver configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::protocol::constants::{DEVICE_TIMEOUT_MS, POLL_TIMEOUT_MS};

/// Tunables for a receiver driver instance.
///
/// Every field has a default, so a partial TOML file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Seconds between poll ticks.
    pub poll_interval_secs: u64,
    /// Receive timeout for a poll tick.
    pub poll_timeout_ms: u64,
    /// Base timeout for synchronous transfers.
    pub transfer_timeout_ms: u64,
    /// Setup attempts before giving up.
    pub setup_attempts: u32,
    /// Wait before each setup attempt.
    pub setup_retry_delay_ms: u64,
    /// Reported in the device description.
    pub agent_version: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            poll_timeout_ms: POLL_TIMEOUT_MS,
            transfer_timeout_ms: DEVICE_TIMEOUT_MS,
            setup_attempts: 5,
            setup_retry_delay_ms: 200,
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl DriverConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DriverConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the poll thread spin or setup never run.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        if self.setup_attempts == 0 {
            bail!("setup_attempts must be at least 1");
        }
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Never shorter than one second, even for an unvalidated config.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn setup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.setup_retry_delay_ms)
    }
}
