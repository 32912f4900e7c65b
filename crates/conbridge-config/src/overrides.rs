//! Environment overrides for the initial pseudo-console geometry.
//!
//! `WIN_PTY_COLS` / `WIN_PTY_ROWS` win over the config file. They are read
//! when a session opens, not cached, so a long-lived host picks up changes
//! for the next session.

use crate::schema::{BridgeConfig, TerminalConfig};
use tracing::warn;

/// Environment variable overriding `terminal.cols`.
pub const ENV_COLS: &str = "WIN_PTY_COLS";

/// Environment variable overriding `terminal.rows`.
pub const ENV_ROWS: &str = "WIN_PTY_ROWS";

/// Apply `WIN_PTY_COLS` / `WIN_PTY_ROWS` from the process environment.
pub fn apply_env_overrides(config: &mut BridgeConfig) {
    apply_overrides_from(&mut config.terminal, |key| std::env::var(key).ok());
}

/// Initial `(cols, rows)` for a new session: the terminal config with the
/// current environment applied on top.
pub fn initial_size(terminal: &TerminalConfig) -> (u16, u16) {
    let mut resolved = terminal.clone();
    apply_overrides_from(&mut resolved, |key| std::env::var(key).ok());
    (resolved.cols, resolved.rows)
}

fn apply_overrides_from(terminal: &mut TerminalConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(cols) = parse_dimension(ENV_COLS, lookup(ENV_COLS)) {
        terminal.cols = cols;
    }
    if let Some(rows) = parse_dimension(ENV_ROWS, lookup(ENV_ROWS)) {
        terminal.rows = rows;
    }
}

fn parse_dimension(key: &str, raw: Option<String>) -> Option<u16> {
    let raw = raw?;
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => {
            warn!("ignoring {key}={raw:?}: expected a positive integer");
            None
        }
        Ok(value) => Some(value),
    }
}
