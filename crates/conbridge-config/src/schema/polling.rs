//! Polling intervals for the data and exit-status loops.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Sleep between availability probes while a read waits for data
    /// (valid range: 1-1000 ms).
    pub read_interval_ms: u32,
    /// Sleep between exit-status checks in `wait_for` (valid range: 10-60000 ms).
    pub exit_interval_ms: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            read_interval_ms: 20,
            exit_interval_ms: 1000,
        }
    }
}

impl PollingConfig {
    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.read_interval_ms))
    }

    pub fn exit_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.exit_interval_ms))
    }
}
