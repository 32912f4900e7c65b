//! In-memory pipe and agent doubles shared by the unit tests.

use std::any::Any;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::agent::{
    AgentBackend, AgentConfig, AgentConnection, ChildProcess, Direction, SpawnConfig,
};
use crate::channel::{PipeOps, RawHandle};
use crate::error::SpawnStep;
use crate::session::{SpawnRequest, WinSize};

pub(crate) const CONIN_HANDLE: RawHandle = 100;
pub(crate) const CONOUT_HANDLE: RawHandle = 101;

/// A byte queue standing in for an OS pipe. Every handle value maps to the
/// same queue, so a writer on one handle feeds a reader on another.
#[derive(Default)]
pub(crate) struct MockPipe {
    buffer: Mutex<VecDeque<u8>>,
    pub(crate) probe_fails: AtomicBool,
    pub(crate) write_fails: AtomicBool,
    pub(crate) release_fails: AtomicBool,
    pub(crate) empty_reads: AtomicBool,
    released: Mutex<Vec<RawHandle>>,
    probes: AtomicUsize,
    write_gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl MockPipe {
    pub(crate) fn push(&self, bytes: &[u8]) {
        self.buffer.lock().unwrap().extend(bytes);
    }

    pub(crate) fn released(&self) -> Vec<RawHandle> {
        self.released.lock().unwrap().clone()
    }

    pub(crate) fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Make the next `write` stop inside the pipe call. The first receiver
    /// fires once the write is held; sending on the returned sender lets it
    /// finish.
    pub(crate) fn hold_next_write(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        *self.write_gate.lock().unwrap() = Some((entered_tx, resume_rx));
        (entered_rx, resume_tx)
    }
}

impl PipeOps for MockPipe {
    fn available(&self, _handle: RawHandle) -> io::Result<usize> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.probe_fails.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
        }
        Ok(self.buffer.lock().unwrap().len())
    }

    fn read(&self, _handle: RawHandle, buf: &mut [u8]) -> io::Result<usize> {
        if self.empty_reads.load(Ordering::SeqCst) {
            return Ok(0);
        }
        let mut buffer = self.buffer.lock().unwrap();
        let n = buf.len().min(buffer.len());
        for (slot, byte) in buf.iter_mut().zip(buffer.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&self, _handle: RawHandle, buf: &[u8]) -> io::Result<usize> {
        let gate = self.write_gate.lock().unwrap().take();
        if let Some((entered, resume)) = gate {
            entered.send(()).unwrap();
            resume.recv().unwrap();
        }
        if self.write_fails.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "no reader"));
        }
        self.push(buf);
        Ok(buf.len())
    }

    fn release(&self, handle: RawHandle) -> io::Result<()> {
        self.released.lock().unwrap().push(handle);
        if self.release_fails.load(Ordering::SeqCst) {
            return Err(io::Error::other("CloseHandle failed"));
        }
        Ok(())
    }
}

/// Counters shared between a [`MockBackend`] and the objects it hands out.
#[derive(Default)]
pub(crate) struct MockLedger {
    pub(crate) configs_freed: AtomicUsize,
    pub(crate) connections_freed: AtomicUsize,
    pub(crate) spawn_configs_freed: AtomicUsize,
    pub(crate) processes_freed: AtomicUsize,
    pub(crate) exit_checks: AtomicUsize,
    pub(crate) terminated: AtomicUsize,
    pub(crate) sizes: Mutex<Vec<WinSize>>,
    pub(crate) plain_text: AtomicBool,
    pub(crate) command_line: Mutex<Option<String>>,
    pub(crate) env_block: Mutex<Option<String>>,
}

/// How the mock child decides when it has exited.
#[derive(Clone, Copy)]
pub(crate) enum MockExit {
    Never,
    Immediately(i32),
    After(Duration, i32),
}

pub(crate) struct MockBackend {
    pub(crate) pipe: Arc<MockPipe>,
    pub(crate) ledger: Arc<MockLedger>,
    pub(crate) fail_at: Option<SpawnStep>,
    pub(crate) exit: MockExit,
}

impl MockBackend {
    pub(crate) fn new(exit: MockExit) -> Self {
        Self {
            pipe: Arc::new(MockPipe::default()),
            ledger: Arc::new(MockLedger::default()),
            fail_at: None,
            exit,
        }
    }

    pub(crate) fn failing_at(step: SpawnStep) -> Self {
        Self {
            fail_at: Some(step),
            ..Self::new(MockExit::Never)
        }
    }

    fn check(&self, step: SpawnStep) -> Result<(), String> {
        if self.fail_at == Some(step) {
            Err(format!("mock failure at {step}"))
        } else {
            Ok(())
        }
    }
}

impl AgentBackend for MockBackend {
    fn new_config(&self, plain_text: bool) -> Result<Box<dyn AgentConfig>, String> {
        self.check(SpawnStep::AgentConfig)?;
        self.ledger.plain_text.store(plain_text, Ordering::SeqCst);
        Ok(Box::new(MockConfig {
            fail_size: self.fail_at == Some(SpawnStep::InitialSize),
            ledger: Arc::clone(&self.ledger),
        }))
    }

    fn open(&self, _config: &dyn AgentConfig) -> Result<Box<dyn AgentConnection>, String> {
        self.check(SpawnStep::AgentOpen)?;
        Ok(Box::new(MockConnection {
            fail_at: self.fail_at,
            exit: self.exit,
            ledger: Arc::clone(&self.ledger),
        }))
    }

    fn open_channel(&self, name: &str, direction: Direction) -> io::Result<RawHandle> {
        if self.fail_at == Some(SpawnStep::DataChannels) && direction == Direction::Read {
            return Err(io::Error::new(io::ErrorKind::NotFound, name.to_string()));
        }
        Ok(match direction {
            Direction::Write => CONIN_HANDLE,
            Direction::Read => CONOUT_HANDLE,
        })
    }

    fn pipe_ops(&self) -> Arc<dyn PipeOps> {
        self.pipe.clone()
    }
}

struct MockConfig {
    fail_size: bool,
    ledger: Arc<MockLedger>,
}

impl AgentConfig for MockConfig {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn set_initial_size(&mut self, size: WinSize) -> Result<(), String> {
        if self.fail_size {
            return Err("set_initial_size failed".into());
        }
        self.ledger.sizes.lock().unwrap().push(size);
        Ok(())
    }
}

impl Drop for MockConfig {
    fn drop(&mut self) {
        self.ledger.configs_freed.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockConnection {
    fail_at: Option<SpawnStep>,
    exit: MockExit,
    ledger: Arc<MockLedger>,
}

struct MockSpawnConfig {
    ledger: Arc<MockLedger>,
}

impl SpawnConfig for MockSpawnConfig {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockSpawnConfig {
    fn drop(&mut self) {
        self.ledger.spawn_configs_freed.fetch_add(1, Ordering::SeqCst);
    }
}

impl AgentConnection for MockConnection {
    fn conin_name(&self) -> Result<String, String> {
        Ok(r"\\.\pipe\mock-conin".into())
    }

    fn conout_name(&self) -> Result<String, String> {
        Ok(r"\\.\pipe\mock-conout".into())
    }

    fn spawn_config(&self, request: &SpawnRequest<'_>) -> Result<Box<dyn SpawnConfig>, String> {
        if self.fail_at == Some(SpawnStep::SpawnConfig) {
            return Err("winpty spawn cfg is null".into());
        }
        *self.ledger.command_line.lock().unwrap() = Some(request.command_line.to_string());
        *self.ledger.env_block.lock().unwrap() = request.env_block.map(str::to_string);
        Ok(Box::new(MockSpawnConfig {
            ledger: Arc::clone(&self.ledger),
        }))
    }

    fn spawn(&self, _config: &dyn SpawnConfig) -> Result<Box<dyn ChildProcess>, String> {
        if self.fail_at == Some(SpawnStep::Spawn) {
            return Err("Error running process".into());
        }
        Ok(Box::new(MockChild {
            started: Instant::now(),
            exit: self.exit,
            ledger: Arc::clone(&self.ledger),
        }))
    }

    fn set_size(&self, size: WinSize) -> Result<(), String> {
        self.ledger.sizes.lock().unwrap().push(size);
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.ledger.connections_freed.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockChild {
    started: Instant,
    exit: MockExit,
    ledger: Arc<MockLedger>,
}

impl ChildProcess for MockChild {
    fn exit_code(&self) -> io::Result<Option<i32>> {
        self.ledger.exit_checks.fetch_add(1, Ordering::SeqCst);
        if self.ledger.terminated.load(Ordering::SeqCst) > 0 {
            return Ok(Some(1));
        }
        Ok(match self.exit {
            MockExit::Never => None,
            MockExit::Immediately(code) => Some(code),
            MockExit::After(delay, code) => (self.started.elapsed() >= delay).then_some(code),
        })
    }

    fn terminate(&self) -> io::Result<()> {
        self.ledger.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        Some(4242)
    }
}

impl Drop for MockChild {
    fn drop(&mut self) {
        self.ledger.processes_freed.fetch_add(1, Ordering::SeqCst);
    }
}
