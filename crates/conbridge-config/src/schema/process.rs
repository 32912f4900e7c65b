//! Child process teardown behaviour.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Terminate the child before releasing the session on `destroy`.
    /// When false, only the agent and handles are released.
    pub kill_on_destroy: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            kill_on_destroy: true,
        }
    }
}
