//! Orphan folder reclaimer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Periodic orphan folder sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclaimerConfig {
    /// Whether the sweep runs while serving.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between sweeps.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

impl ReclaimerConfig {
    /// Sweep period as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_seconds: default_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    12 * 60 * 60
}
