//! Process-style facade over an [`AgentSession`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use conbridge_config::schema::TerminalConfig;
use conbridge_config::BridgeConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::{default_backend, AgentBackend};
use crate::channel::READ_POLL_INTERVAL;
use crate::cmdline::{flatten_env, join_args};
use crate::error::BridgeError;
use crate::session::{AgentSession, ExitState, SessionOptions, SpawnRequest, WinSize};
use crate::stream::{ChannelReader, ChannelWriter};

/// Default sleep between exit checks in [`ProcessBridge::wait_for`].
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A command to run under a pseudo-console.
#[derive(Debug, Clone, Default)]
pub struct PtyCommand {
    argv: Vec<String>,
    cwd: Option<PathBuf>,
    env: Option<Vec<(String, String)>>,
    console_mode: bool,
    size: Option<WinSize>,
}

impl PtyCommand {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add one variable. The first call replaces the inherited host
    /// environment with an explicit, ordered one.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .get_or_insert_with(Vec::new)
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn console_mode(mut self, enabled: bool) -> Self {
        self.console_mode = enabled;
        self
    }

    pub fn size(mut self, cols: u16, rows: u16) -> Self {
        self.size = Some(WinSize::new(cols, rows));
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn is_console_mode(&self) -> bool {
        self.console_mode
    }

    pub fn command_line(&self) -> String {
        join_args(&self.argv)
    }

    /// `None` when the host environment is inherited.
    pub fn env_block(&self) -> Option<String> {
        self.env.as_ref().map(|vars| flatten_env(vars.iter().cloned()))
    }
}

/// Timing and teardown settings.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub read_poll_interval: Duration,
    pub exit_poll_interval: Duration,
    /// Terminate the child in [`ProcessBridge::destroy`] before tearing the
    /// session down.
    pub kill_on_destroy: bool,
    /// Geometry used when the command has no explicit size.
    pub terminal: TerminalConfig,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            read_poll_interval: READ_POLL_INTERVAL,
            exit_poll_interval: EXIT_POLL_INTERVAL,
            kill_on_destroy: true,
            terminal: TerminalConfig::default(),
        }
    }
}

impl BridgeOptions {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            read_poll_interval: config.polling.read_interval(),
            exit_poll_interval: config.polling.exit_interval(),
            kill_on_destroy: config.process.kill_on_destroy,
            terminal: config.terminal.clone(),
        }
    }
}

/// A child process running under a pseudo-console agent.
///
/// Input, output and lifecycle mirror a regular child process. The error
/// stream exists only in console mode, where it is always empty; check
/// [`has_error_stream`](Self::has_error_stream) first.
#[derive(Debug)]
pub struct ProcessBridge {
    session: AgentSession,
    console_mode: bool,
    exit_poll_interval: Duration,
    kill_on_destroy: bool,
}

impl ProcessBridge {
    /// Spawn `command` under the host platform's agent.
    pub fn spawn(command: &PtyCommand, options: &BridgeOptions) -> Result<Self, BridgeError> {
        let backend = default_backend();
        Self::spawn_with(backend.as_ref(), command, options)
    }

    pub fn spawn_with(
        backend: &dyn AgentBackend,
        command: &PtyCommand,
        options: &BridgeOptions,
    ) -> Result<Self, BridgeError> {
        let command_line = command.command_line();
        let env_block = command.env_block();
        let request = SpawnRequest {
            command_line: &command_line,
            cwd: command.get_cwd(),
            env_block: env_block.as_deref(),
        };
        let session_options = SessionOptions {
            console_mode: command.console_mode,
            size: command.size,
            terminal: options.terminal.clone(),
            read_poll_interval: options.read_poll_interval,
        };
        debug!(%command_line, "spawning under pseudo-console");

        let session = AgentSession::open(backend, &request, &session_options)?;
        Ok(Self {
            session,
            console_mode: command.console_mode,
            exit_poll_interval: options.exit_poll_interval,
            kill_on_destroy: options.kill_on_destroy,
        })
    }

    pub fn session(&self) -> &AgentSession {
        &self.session
    }

    /// Writer toward the child's input.
    pub fn stdin(&self) -> ChannelWriter {
        ChannelWriter::new(Arc::clone(self.session.conin()))
    }

    /// Reader over the child's output.
    pub fn stdout(&self) -> ChannelReader {
        ChannelReader::new(Arc::clone(self.session.conout()))
    }

    pub fn has_error_stream(&self) -> bool {
        self.console_mode
    }

    /// The child's error stream.
    ///
    /// The agent merges error output into the output channel, so in console
    /// mode this is an empty stream. Without console mode it is unsupported.
    pub fn stderr(&self) -> Result<io::Empty, BridgeError> {
        if self.console_mode {
            Ok(io::empty())
        } else {
            Err(BridgeError::Unsupported(
                "error stream is only available in console mode",
            ))
        }
    }

    pub fn exit_state(&self) -> ExitState {
        self.session.exit_value()
    }

    pub fn is_running(&self) -> bool {
        self.exit_state() == ExitState::Running
    }

    /// The exit code, if the child has exited.
    pub fn exit_value(&self) -> Result<i32, BridgeError> {
        match self.exit_state() {
            ExitState::Exited(code) => Ok(code),
            ExitState::Running => Err(BridgeError::NotTerminated),
            ExitState::NotAvailable => Err(BridgeError::SessionClosed),
        }
    }

    /// Wait for the child to exit, checking once per exit poll interval.
    ///
    /// Returns `Cancelled` as soon as `cancel` fires. Dropping the future
    /// also stops the wait.
    pub async fn wait_for(&self, cancel: &CancellationToken) -> Result<i32, BridgeError> {
        loop {
            match self.exit_state() {
                ExitState::Exited(code) => return Ok(code),
                ExitState::NotAvailable => return Err(BridgeError::SessionClosed),
                ExitState::Running => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(BridgeError::Cancelled),
                _ = tokio::time::sleep(self.exit_poll_interval) => {}
            }
        }
    }

    pub fn set_size(&self, cols: u16, rows: u16) -> Result<(), BridgeError> {
        self.session
            .set_size(WinSize::new(cols, rows))
            .map_err(BridgeError::Resize)
    }

    pub fn win_size(&self) -> WinSize {
        self.session.win_size()
    }

    pub fn pid(&self) -> Option<u32> {
        self.session.pid()
    }

    /// Stop the child (when `kill_on_destroy` is set) and tear the session
    /// down. Termination is best effort; teardown errors are returned.
    pub fn destroy(&self) -> Result<(), BridgeError> {
        if self.kill_on_destroy && self.is_running() {
            if let Err(e) = self.session.terminate() {
                warn!(session = self.session.id().short(), "failed to terminate child: {e}");
            }
        }
        self.session.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, MockExit};
    use std::io::{Read, Write};
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    fn fast_options() -> BridgeOptions {
        BridgeOptions {
            read_poll_interval: Duration::from_millis(2),
            exit_poll_interval: Duration::from_millis(50),
            ..BridgeOptions::default()
        }
    }

    fn spawn(backend: &MockBackend, command: &PtyCommand) -> ProcessBridge {
        ProcessBridge::spawn_with(backend, command, &fast_options()).unwrap()
    }

    #[test]
    fn command_encodes_argv_and_env() {
        let command = PtyCommand::new(["cmd.exe", "/c", "dir C:\\Program Files\\"])
            .env("A", "1")
            .envs([("B", "2")]);
        assert_eq!(command.command_line(), "cmd.exe /c \"dir C:\\Program Files\\\\\"");
        assert_eq!(command.env_block().as_deref(), Some("A=1\0B=2\0\0"));
        assert_eq!(PtyCommand::new(["x"]).env_block(), None);
    }

    #[test]
    fn spawn_forwards_command_to_agent() {
        let backend = MockBackend::new(MockExit::Never);
        let bridge = spawn(
            &backend,
            &PtyCommand::new(["a b", "c"]).size(90, 30).console_mode(true),
        );
        assert_eq!(
            backend.ledger.command_line.lock().unwrap().as_deref(),
            Some("\"a b\" c")
        );
        assert!(backend.ledger.plain_text.load(Ordering::SeqCst));
        assert_eq!(bridge.win_size(), WinSize::new(90, 30));
        assert_eq!(bridge.pid(), Some(4242));
    }

    #[test]
    fn spawn_failure_is_wrapped() {
        let backend = MockBackend::failing_at(crate::SpawnStep::AgentOpen);
        let err = ProcessBridge::spawn_with(&backend, &PtyCommand::new(["x"]), &fast_options())
            .unwrap_err();
        assert!(matches!(err, BridgeError::Spawn(_)));
        assert!(err.to_string().starts_with("couldn't create pty: agent open failed"));
    }

    #[test]
    fn stdin_and_stdout_share_the_agent_pipes() {
        let backend = MockBackend::new(MockExit::Never);
        let bridge = spawn(&backend, &PtyCommand::new(["x"]));

        // The mock pipe loops input back as output.
        bridge.stdin().write_all(b"echo").unwrap();
        let mut buf = [0u8; 4];
        bridge.stdout().read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"echo");
    }

    #[test]
    fn error_stream_follows_console_mode() {
        let backend = MockBackend::new(MockExit::Never);
        let console = spawn(&backend, &PtyCommand::new(["x"]).console_mode(true));
        assert!(console.has_error_stream());
        let mut out = Vec::new();
        console.stderr().unwrap().read_to_end(&mut out).unwrap();
        assert!(out.is_empty());

        let backend = MockBackend::new(MockExit::Never);
        let raw = spawn(&backend, &PtyCommand::new(["x"]));
        assert!(!raw.has_error_stream());
        assert!(matches!(raw.stderr(), Err(BridgeError::Unsupported(_))));
    }

    #[test]
    fn exit_value_before_and_after_exit() {
        let backend = MockBackend::new(MockExit::Never);
        let running = spawn(&backend, &PtyCommand::new(["x"]));
        assert!(running.is_running());
        assert!(matches!(running.exit_value(), Err(BridgeError::NotTerminated)));

        let backend = MockBackend::new(MockExit::Immediately(7));
        let exited = spawn(&backend, &PtyCommand::new(["x"]));
        assert!(!exited.is_running());
        assert_eq!(exited.exit_value().unwrap(), 7);
        assert_eq!(exited.exit_value().unwrap(), 7);
    }

    #[test]
    fn set_size_after_destroy_is_ignored() {
        let backend = MockBackend::new(MockExit::Never);
        let bridge = spawn(&backend, &PtyCommand::new(["x"]).size(80, 25));
        bridge.set_size(100, 50).unwrap();
        bridge.destroy().unwrap();
        bridge.set_size(10, 10).unwrap();
        assert_eq!(bridge.win_size(), WinSize::new(100, 50));
    }

    #[test]
    fn destroy_terminates_then_closes() {
        let backend = MockBackend::new(MockExit::Never);
        let bridge = spawn(&backend, &PtyCommand::new(["x"]));
        bridge.destroy().unwrap();

        assert_eq!(backend.ledger.terminated.load(Ordering::SeqCst), 1);
        assert_eq!(backend.ledger.connections_freed.load(Ordering::SeqCst), 1);
        assert!(matches!(bridge.exit_value(), Err(BridgeError::SessionClosed)));
    }

    #[test]
    fn destroy_without_kill_only_closes() {
        let backend = MockBackend::new(MockExit::Never);
        let options = BridgeOptions {
            kill_on_destroy: false,
            ..fast_options()
        };
        let bridge =
            ProcessBridge::spawn_with(&backend, &PtyCommand::new(["x"]), &options).unwrap();
        bridge.destroy().unwrap();
        bridge.destroy().unwrap();

        assert_eq!(backend.ledger.terminated.load(Ordering::SeqCst), 0);
        assert_eq!(backend.ledger.processes_freed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_for_returns_exit_code() {
        let backend = MockBackend::new(MockExit::After(Duration::from_millis(120), 42));
        let bridge = spawn(&backend, &PtyCommand::new(["x"]));

        let code = bridge.wait_for(&CancellationToken::new()).await.unwrap();
        assert_eq!(code, 42);
    }

    #[tokio::test]
    async fn wait_for_checks_once_per_interval() {
        let backend = MockBackend::new(MockExit::After(Duration::from_millis(2500), 42));
        let bridge =
            ProcessBridge::spawn_with(&backend, &PtyCommand::new(["x"]), &BridgeOptions::default())
                .unwrap();

        let started = Instant::now();
        let code = bridge.wait_for(&CancellationToken::new()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(code, 42);
        assert!(elapsed >= Duration::from_millis(2500));
        assert!(elapsed < Duration::from_millis(3500));
        // Checks at roughly 0s, 1s, 2s and 3s.
        assert!(backend.ledger.exit_checks.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn wait_for_honors_cancellation() {
        let backend = MockBackend::new(MockExit::Never);
        let bridge = spawn(&backend, &PtyCommand::new(["x"]));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = bridge.wait_for(&cancel).await.unwrap_err();
        assert!(matches!(err, BridgeError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn wait_for_on_closed_session_fails() {
        let backend = MockBackend::new(MockExit::Never);
        let bridge = spawn(&backend, &PtyCommand::new(["x"]));
        bridge.destroy().unwrap();

        let err = bridge.wait_for(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, BridgeError::SessionClosed));
    }
}
