//! Supervisor timing configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing knobs for the acquisition loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Pause after opening the device before frames are trusted.
    pub warm_up_ms: u64,
    /// Pause after each failed read.
    pub failure_pause_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            warm_up_ms: 2000,
            failure_pause_ms: 100,
        }
    }
}

impl SupervisorConfig {
    /// No warm-up and no failure pause. Intended for simulated devices.
    pub fn immediate() -> Self {
        Self {
            warm_up_ms: 0,
            failure_pause_ms: 0,
        }
    }

    pub fn warm_up(&self) -> Duration {
        Duration::from_millis(self.warm_up_ms)
    }

    pub fn failure_pause(&self) -> Duration {
        Duration::from_millis(self.failure_pause_ms)
    }
}
