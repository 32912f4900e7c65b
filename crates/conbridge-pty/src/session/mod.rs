//! One agent, one child, two channels.
//!
//! [`AgentSession::open`] builds everything in a fixed order and tags any
//! failure with the [`SpawnStep`] it happened in. Every intermediate native
//! object is an owned value, so an early return frees what was built so far.
//! After a successful open the session keeps only the agent connection, the
//! child process and the two channels.

mod types;


pub use types::{ExitState, SessionOptions, SpawnRequest, WinSize};

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use conbridge_common::SessionId;
use tracing::{debug, info, warn};

use crate::agent::{AgentBackend, AgentConnection, ChildProcess, Direction};
use crate::channel::{DuplexChannel, PipeOps};
use crate::error::{SpawnError, SpawnStep};

/// Native objects released by teardown. The agent is freed before the
/// process handle is closed.
struct Live {
    connection: Box<dyn AgentConnection>,
    process: Box<dyn ChildProcess>,
}

pub struct AgentSession {
    id: SessionId,
    conin: Arc<DuplexChannel>,
    conout: Arc<DuplexChannel>,
    live: Mutex<Option<Live>>,
    size: Mutex<WinSize>,
    exit: OnceLock<i32>,
    pid: Option<u32>,
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn failed(step: SpawnStep) -> impl FnOnce(String) -> SpawnError {
    move |reason| SpawnError::new(step, reason)
}

fn open_channel(
    backend: &dyn AgentBackend,
    ops: &Arc<dyn PipeOps>,
    label: &'static str,
    name: &str,
    direction: Direction,
    options: &SessionOptions,
) -> Result<DuplexChannel, SpawnError> {
    let handle = backend.open_channel(name, direction).map_err(|e| {
        SpawnError::new(
            SpawnStep::DataChannels,
            format!("could not connect to CONIN/CONOUT pipes: {e}"),
        )
    })?;
    debug!(channel = label, name, "data channel connected");
    Ok(DuplexChannel::new(label, handle, Arc::clone(ops))
        .with_poll_interval(options.read_poll_interval))
}

impl AgentSession {
    /// Start an agent and spawn the child described by `request` under it.
    pub fn open(
        backend: &dyn AgentBackend,
        request: &SpawnRequest<'_>,
        options: &SessionOptions,
    ) -> Result<Self, SpawnError> {
        let id = SessionId::new();

        let mut config = backend
            .new_config(options.console_mode)
            .map_err(failed(SpawnStep::AgentConfig))?;

        let size = options
            .size
            .unwrap_or_else(|| WinSize::from(conbridge_config::initial_size(&options.terminal)));
        config
            .set_initial_size(size)
            .map_err(failed(SpawnStep::InitialSize))?;

        let connection = backend
            .open(config.as_ref())
            .map_err(failed(SpawnStep::AgentOpen))?;
        drop(config);

        let ops = backend.pipe_ops();
        let conin_name = connection
            .conin_name()
            .map_err(failed(SpawnStep::DataChannels))?;
        let conout_name = connection
            .conout_name()
            .map_err(failed(SpawnStep::DataChannels))?;
        let conin = open_channel(backend, &ops, "conin", &conin_name, Direction::Write, options)?;
        let conout = open_channel(backend, &ops, "conout", &conout_name, Direction::Read, options)?;

        let spawn_config = connection
            .spawn_config(request)
            .map_err(failed(SpawnStep::SpawnConfig))?;
        let process = connection
            .spawn(spawn_config.as_ref())
            .map_err(failed(SpawnStep::Spawn))?;
        drop(spawn_config);

        let pid = process.pid();
        info!(
            session = id.short(),
            pid = ?pid,
            size = %size,
            console_mode = options.console_mode,
            "session opened"
        );

        Ok(Self {
            id,
            conin: Arc::new(conin),
            conout: Arc::new(conout),
            live: Mutex::new(Some(Live {
                connection,
                process,
            })),
            size: Mutex::new(size),
            exit: OnceLock::new(),
            pid,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Channel carrying input to the child.
    pub fn conin(&self) -> &Arc<DuplexChannel> {
        &self.conin
    }

    /// Channel carrying the child's output.
    pub fn conout(&self) -> &Arc<DuplexChannel> {
        &self.conout
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_closed(&self) -> bool {
        self.live().is_none()
    }

    /// Resize the console. A no-op once the session is closed.
    pub fn set_size(&self, size: WinSize) -> Result<(), String> {
        let live = self.live();
        let Some(live) = live.as_ref() else {
            return Ok(());
        };
        live.connection.set_size(size)?;
        *self.size.lock().unwrap_or_else(PoisonError::into_inner) = size;
        debug!(session = self.id.short(), size = %size, "console resized");
        Ok(())
    }

    /// Last size the console was given.
    pub fn win_size(&self) -> WinSize {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current exit state. An observed exit code is kept and returned from
    /// then on, including after `close`.
    pub fn exit_value(&self) -> ExitState {
        if let Some(code) = self.exit.get() {
            return ExitState::Exited(*code);
        }
        let live = self.live();
        let Some(live) = live.as_ref() else {
            return ExitState::NotAvailable;
        };
        match live.process.exit_code() {
            Ok(Some(code)) => {
                let code = *self.exit.get_or_init(|| code);
                debug!(session = self.id.short(), code, "child exited");
                ExitState::Exited(code)
            }
            Ok(None) => ExitState::Running,
            Err(e) => {
                debug!(session = self.id.short(), "exit code query failed: {e}");
                ExitState::Running
            }
        }
    }

    /// Force the child to exit. A no-op once the session is closed.
    pub fn terminate(&self) -> io::Result<()> {
        match self.live().as_ref() {
            Some(live) => live.process.terminate(),
            None => Ok(()),
        }
    }

    /// Tear the session down. Only the first call does anything.
    ///
    /// Pending reads end first, then the agent and the process handle are
    /// freed, then both channel handles are released. Returns the first
    /// release error.
    pub fn close(&self) -> io::Result<()> {
        self.conin.mark_closed();
        self.conout.mark_closed();

        let live = self.live().take();
        if let Some(live) = live {
            drop(live);
            info!(session = self.id.short(), "session closed");
        }

        let conin = self.conin.close();
        let conout = self.conout.close();
        conin.and(conout)
    }

    fn live(&self) -> MutexGuard<'_, Option<Live>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AgentSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(session = self.id.short(), "session teardown failed: {e}");
        }
    }
}
