use std::fmt;
use std::path::Path;
use std::time::Duration;

use conbridge_config::schema::TerminalConfig;

use crate::channel::READ_POLL_INTERVAL;

/// Terminal geometry in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinSize {
    pub cols: u16,
    pub rows: u16,
}

impl WinSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for WinSize {
    fn default() -> Self {
        Self { cols: 80, rows: 25 }
    }
}

impl From<(u16, u16)> for WinSize {
    fn from((cols, rows): (u16, u16)) -> Self {
        Self { cols, rows }
    }
}

impl fmt::Display for WinSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Where the child process stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    /// The session is closed and no exit code was observed before that.
    NotAvailable,
    Running,
    Exited(i32),
}

impl ExitState {
    /// Legacy integer encoding: `-2` not available, `-1` running, otherwise
    /// the exit code. Ambiguous for children that really exit with `-1` or
    /// `-2`; match on the enum instead where that matters.
    pub fn code(self) -> i32 {
        match self {
            ExitState::NotAvailable => -2,
            ExitState::Running => -1,
            ExitState::Exited(code) => code,
        }
    }
}

/// What to run, already encoded for the agent.
#[derive(Debug, Clone, Copy)]
pub struct SpawnRequest<'a> {
    pub command_line: &'a str,
    pub cwd: Option<&'a Path>,
    /// `None` inherits the host environment.
    pub env_block: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Ask the agent for plain text output.
    pub console_mode: bool,
    /// Initial geometry. When `None`, `terminal` plus the `WIN_PTY_COLS` /
    /// `WIN_PTY_ROWS` environment decide it at open time.
    pub size: Option<WinSize>,
    pub terminal: TerminalConfig,
    pub read_poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            console_mode: false,
            size: None,
            terminal: TerminalConfig::default(),
            read_poll_interval: READ_POLL_INTERVAL,
        }
    }
}
