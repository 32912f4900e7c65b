//! Pseudo-console agents.
//!
//! An agent owns the console a child runs in and exposes it as two named
//! byte channels. The session drives a backend through these traits;
//! dropping any returned value frees the native resource behind it.
//! Failures are reported as plain reasons and tagged with a
//! [`SpawnStep`](crate::SpawnStep) by the session.

#[cfg(unix)]
mod fifo;
#[cfg(windows)]
mod winpty;

#[cfg(unix)]
pub use fifo::FifoBackend;
#[cfg(windows)]
pub use winpty::WinptyBackend;

pub use crate::sys::Direction;

use std::any::Any;
use std::io;
use std::sync::Arc;

use crate::channel::{PipeOps, RawHandle};
use crate::session::{SpawnRequest, WinSize};

/// Factory for agent configurations and connections.
pub trait AgentBackend: Send + Sync {
    /// Allocate an agent configuration. `plain_text` asks the agent to strip
    /// escape sequences from the output (console mode).
    fn new_config(&self, plain_text: bool) -> Result<Box<dyn AgentConfig>, String>;

    /// Start the agent described by `config`.
    fn open(&self, config: &dyn AgentConfig) -> Result<Box<dyn AgentConnection>, String>;

    /// Open a channel the agent named. The caller owns the returned handle.
    fn open_channel(&self, name: &str, direction: Direction) -> io::Result<RawHandle> {
        crate::sys::open_named(name, direction)
    }

    /// Operations for the handles returned by `open_channel`.
    fn pipe_ops(&self) -> Arc<dyn PipeOps> {
        crate::sys::default_pipe_ops()
    }
}

pub trait AgentConfig: Send {
    fn set_initial_size(&mut self, size: WinSize) -> Result<(), String>;

    fn as_any(&self) -> &dyn Any;
}

/// A running agent.
pub trait AgentConnection: Send + Sync {
    /// Name of the channel carrying input to the child.
    fn conin_name(&self) -> Result<String, String>;

    /// Name of the channel carrying the child's output.
    fn conout_name(&self) -> Result<String, String>;

    fn spawn_config(&self, request: &SpawnRequest<'_>) -> Result<Box<dyn SpawnConfig>, String>;

    fn spawn(&self, config: &dyn SpawnConfig) -> Result<Box<dyn ChildProcess>, String>;

    fn set_size(&self, size: WinSize) -> Result<(), String>;
}

pub trait SpawnConfig: Send {
    fn as_any(&self) -> &dyn Any;
}

/// The child process attached to an agent.
pub trait ChildProcess: Send + Sync {
    /// `Ok(None)` while the child is still running.
    fn exit_code(&self) -> io::Result<Option<i32>>;

    fn terminate(&self) -> io::Result<()>;

    fn pid(&self) -> Option<u32>;
}

/// The agent for the host platform: winpty on Windows, the FIFO agent on
/// Unix.
pub fn default_backend() -> Arc<dyn AgentBackend> {
    #[cfg(unix)]
    {
        Arc::new(FifoBackend)
    }
    #[cfg(windows)]
    {
        Arc::new(WinptyBackend)
    }
}

/// Downcast a backend-produced value back to the type the backend created.
pub(crate) fn downcast<'a, T: 'static>(value: &'a dyn Any, what: &str) -> Result<&'a T, String> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| format!("{what} was not created by this backend"))
}
