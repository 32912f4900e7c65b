//! Pseudo-console geometry and mode.

use serde::{Deserialize, Serialize};

/// Initial terminal settings for a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Initial width in columns (valid range: 1-1000).
    pub cols: u16,
    /// Initial height in rows (valid range: 1-1000).
    pub rows: u16,
    /// Ask the agent for plain-text output instead of terminal escapes.
    pub console_mode: bool,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 25,
            console_mode: false,
        }
    }
}
