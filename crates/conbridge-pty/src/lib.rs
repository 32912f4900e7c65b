//! Pseudo-console bridge.
//!
//! Runs a child process under a console agent and exposes it as a regular
//! process: a writer for its input, a reader for its output, exit status
//! and resizing. The agent is winpty on Windows and a FIFO agent on Unix.

pub mod agent;
pub mod bridge;
pub mod channel;
pub mod cmdline;
pub mod error;
pub mod session;
pub mod stream;
pub mod sys;

#[cfg(test)]
pub(crate) mod testing;


pub use bridge::{BridgeOptions, ProcessBridge, PtyCommand, EXIT_POLL_INTERVAL};
pub use channel::{DuplexChannel, ReadOutcome};
pub use cmdline::{flatten_env, join_args, parse_env_block};
pub use error::{BridgeError, SpawnError, SpawnStep};
pub use session::{AgentSession, ExitState, WinSize};
pub use stream::{ChannelReader, ChannelWriter};
