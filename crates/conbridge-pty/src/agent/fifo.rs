//! FIFO agent for Unix hosts.
//!
//! The console is a private temp directory holding two named FIFOs. The
//! child runs through `/bin/sh -c` with its standard streams on them.
//!
//! FIFO opens block until the other end exists, so the agent keeps a
//! read-write hold on both FIFOs from `open` until the child is spawned.
//! After that the child is the only writer on `conout` and the only reader
//! on `conin`, and the host sees hang-up or EOF the usual way.

use std::any::Any;
use std::fs::{File, OpenOptions};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Mutex, PoisonError};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tempfile::TempDir;
use tracing::{debug, warn};

use super::{downcast, AgentBackend, AgentConfig, AgentConnection, ChildProcess, SpawnConfig};
use crate::cmdline::parse_env_block;
use crate::session::{SpawnRequest, WinSize};

const SHELL: &str = "/bin/sh";

#[derive(Debug, Default, Clone, Copy)]
pub struct FifoBackend;

struct FifoConfig {
    plain_text: bool,
    size: WinSize,
}

impl AgentConfig for FifoConfig {
    fn set_initial_size(&mut self, size: WinSize) -> Result<(), String> {
        self.size = size;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AgentBackend for FifoBackend {
    fn new_config(&self, plain_text: bool) -> Result<Box<dyn AgentConfig>, String> {
        Ok(Box::new(FifoConfig {
            plain_text,
            size: WinSize::default(),
        }))
    }

    fn open(&self, config: &dyn AgentConfig) -> Result<Box<dyn AgentConnection>, String> {
        let config = downcast::<FifoConfig>(config.as_any(), "agent config")?;

        let dir = tempfile::Builder::new()
            .prefix("conbridge-")
            .tempdir()
            .map_err(|e| format!("could not create agent directory: {e}"))?;
        let conin = make_fifo(dir.path(), "conin")?;
        let conout = make_fifo(dir.path(), "conout")?;
        let holds = [hold(&conin)?, hold(&conout)?];

        debug!(dir = %dir.path().display(), "fifo agent opened");
        Ok(Box::new(FifoConnection {
            _dir: dir,
            conin,
            conout,
            plain_text: config.plain_text,
            size: Mutex::new(config.size),
            holds: Mutex::new(Some(holds)),
        }))
    }
}

fn make_fifo(dir: &Path, name: &str) -> Result<PathBuf, String> {
    let path = dir.join(name);
    mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR)
        .map_err(|e| format!("could not create {name} fifo: {e}"))?;
    Ok(path)
}

fn hold(path: &Path) -> Result<File, String> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| format!("could not open {}: {e}", path.display()))
}

fn path_name(path: &Path) -> Result<String, String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| format!("channel path is not UTF-8: {}", path.display()))
}

struct FifoConnection {
    // Removed, with both FIFOs, when the connection is dropped.
    _dir: TempDir,
    conin: PathBuf,
    conout: PathBuf,
    plain_text: bool,
    size: Mutex<WinSize>,
    holds: Mutex<Option<[File; 2]>>,
}

struct FifoSpawnConfig {
    command_line: String,
    cwd: Option<PathBuf>,
    env: Option<Vec<(String, String)>>,
}

impl SpawnConfig for FifoSpawnConfig {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AgentConnection for FifoConnection {
    fn conin_name(&self) -> Result<String, String> {
        path_name(&self.conin)
    }

    fn conout_name(&self) -> Result<String, String> {
        path_name(&self.conout)
    }

    fn spawn_config(&self, request: &SpawnRequest<'_>) -> Result<Box<dyn SpawnConfig>, String> {
        Ok(Box::new(FifoSpawnConfig {
            command_line: request.command_line.to_string(),
            cwd: request.cwd.map(Path::to_path_buf),
            env: request.env_block.map(parse_env_block),
        }))
    }

    fn spawn(&self, config: &dyn SpawnConfig) -> Result<Box<dyn ChildProcess>, String> {
        let config = downcast::<FifoSpawnConfig>(config.as_any(), "spawn config")?;

        let stdin = OpenOptions::new()
            .read(true)
            .open(&self.conin)
            .map_err(|e| format!("could not attach child input: {e}"))?;
        let stdout = OpenOptions::new()
            .write(true)
            .open(&self.conout)
            .map_err(|e| format!("could not attach child output: {e}"))?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| format!("could not attach child error output: {e}"))?;

        let size = *self.size.lock().unwrap_or_else(PoisonError::into_inner);
        let mut command = Command::new(SHELL);
        command.arg("-c").arg(&config.command_line);
        if let Some(env) = &config.env {
            command.env_clear();
            command.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        command
            .env("COLUMNS", size.cols.to_string())
            .env("LINES", size.rows.to_string());
        if self.plain_text {
            command.env("TERM", "dumb");
        }
        if let Some(cwd) = &config.cwd {
            command.current_dir(cwd);
        }
        command
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        let child = command
            .spawn()
            .map_err(|e| format!("Error running process: {e}"))?;
        drop(command);

        // The child holds its ends now.
        self.holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        debug!(pid = child.id(), "child spawned under fifo agent");
        Ok(Box::new(FifoChild {
            child: Mutex::new(child),
        }))
    }

    fn set_size(&self, size: WinSize) -> Result<(), String> {
        // No window to resize; the size is only passed to the next spawn.
        *self.size.lock().unwrap_or_else(PoisonError::into_inner) = size;
        Ok(())
    }
}

struct FifoChild {
    child: Mutex<Child>,
}

/// Exit code as a shell reports it: the status, or 128 plus the signal.
fn status_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

impl ChildProcess for FifoChild {
    fn exit_code(&self) -> std::io::Result<Option<i32>> {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(child.try_wait()?.map(status_code))
    }

    fn terminate(&self) -> std::io::Result<()> {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        child.kill()
    }

    fn pid(&self) -> Option<u32> {
        Some(self.child.lock().unwrap_or_else(PoisonError::into_inner).id())
    }
}

impl Drop for FifoChild {
    // Freeing the agent ends the console, and the child with it.
    fn drop(&mut self) {
        let child = self.child.get_mut().unwrap_or_else(PoisonError::into_inner);
        match child.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(e) = child.kill() {
                    warn!(pid = child.id(), "failed to stop child: {e}");
                }
                if let Err(e) = child.wait() {
                    warn!(pid = child.id(), "failed to reap child: {e}");
                }
            }
            Err(e) => warn!(pid = child.id(), "failed to poll child: {e}"),
        }
    }
}
