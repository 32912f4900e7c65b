//! Error types for session construction and bridge operations.

use std::fmt;
use std::io;

/// The step of [`AgentSession::open`](crate::AgentSession::open) that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnStep {
    AgentConfig,
    InitialSize,
    AgentOpen,
    DataChannels,
    SpawnConfig,
    Spawn,
}

impl fmt::Display for SpawnStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            SpawnStep::AgentConfig => "agent config",
            SpawnStep::InitialSize => "initial size",
            SpawnStep::AgentOpen => "agent open",
            SpawnStep::DataChannels => "data channels",
            SpawnStep::SpawnConfig => "spawn config",
            SpawnStep::Spawn => "spawn",
        };
        f.write_str(step)
    }
}

/// Opening a pseudo-console session failed. Everything acquired before
/// `step` has already been released.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {reason}")]
pub struct SpawnError {
    pub step: SpawnStep,
    pub reason: String,
}

impl SpawnError {
    pub fn new(step: SpawnStep, reason: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by [`ProcessBridge`](crate::ProcessBridge).
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("couldn't create pty: {0}")]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("process has not terminated yet")]
    NotTerminated,

    #[error("session is closed, exit status not available")]
    SessionClosed,

    #[error("wait for process exit was cancelled")]
    Cancelled,

    #[error("not supported: {0}")]
    Unsupported(&'static str),

    #[error("failed to resize pty: {0}")]
    Resize(String),
}
