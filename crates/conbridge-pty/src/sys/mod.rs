//! Native pipe operations and named-channel opening for the host platform.

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use crate::channel::{PipeOps, RawHandle};

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::FdPipeOps;

#[cfg(windows)]
pub(crate) mod win;
#[cfg(windows)]
pub use win::NamedPipeOps;

/// Which way bytes flow through a channel, from the host's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host reads (the child's output).
    Read,
    /// Host writes (the child's input).
    Write,
}

/// Open the agent channel called `name` and hand over its raw handle.
///
/// The caller owns the returned handle and must release it through
/// [`PipeOps::release`].
pub fn open_named(name: &str, direction: Direction) -> io::Result<RawHandle> {
    let file = match direction {
        Direction::Read => OpenOptions::new().read(true).open(name),
        Direction::Write => OpenOptions::new().write(true).open(name),
    }
    .map_err(|e| io::Error::new(e.kind(), format!("could not connect to {name}: {e}")))?;
    Ok(into_raw(file))
}

#[cfg(unix)]
fn into_raw(file: std::fs::File) -> RawHandle {
    use std::os::unix::io::IntoRawFd;
    file.into_raw_fd() as RawHandle
}

#[cfg(windows)]
fn into_raw(file: std::fs::File) -> RawHandle {
    use std::os::windows::io::IntoRawHandle;
    file.into_raw_handle() as RawHandle
}

/// Pipe operations matching handles produced by [`open_named`].
pub fn default_pipe_ops() -> Arc<dyn PipeOps> {
    #[cfg(unix)]
    {
        Arc::new(FdPipeOps)
    }
    #[cfg(windows)]
    {
        Arc::new(NamedPipeOps)
    }
}
