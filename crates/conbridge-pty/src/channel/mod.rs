//! Shared ownership of one raw pipe handle.
//!
//! A [`DuplexChannel`] is used concurrently by a reader, a writer and a
//! closer. Reads, writes and `close` are serialized by one per-channel lock;
//! [`DuplexChannel::mark_closed`] deliberately skips that lock so closing
//! never waits behind a read that is polling for data.
//!
//! # Invariants
//!
//! 1. The handle cell holds either a live handle or [`CLOSED`]. Once it is
//!    `CLOSED` it stays `CLOSED`.
//! 2. Every operation loads the cell at entry and again after taking the
//!    lock; a `CLOSED` cell ends the operation (`EndOfStream` / `0`).
//! 3. Each OS handle is released at most once, by `close` or by `Drop`.
//!
//! A probe that loaded the handle just before `mark_closed` may still call
//! into the OS with it. That window is accepted: the handle is only released
//! later, by `close` or `Drop`.

mod ops;


pub use ops::{PipeOps, RawHandle, CLOSED};

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Default sleep between availability probes while a read waits for data.
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of a successful [`DuplexChannel::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were copied into the buffer.
    Data(usize),
    /// The channel is closed or the peer is gone. Not an error.
    EndOfStream,
}

/// One raw duplex pipe handle with serialized read/write/close.
pub struct DuplexChannel {
    label: &'static str,
    cell: AtomicIsize,
    /// Handle detached by `mark_closed`, waiting for `close` or `Drop`.
    parked: Mutex<Option<RawHandle>>,
    exclusive: Mutex<()>,
    ops: Arc<dyn PipeOps>,
    poll_interval: Duration,
}

impl fmt::Debug for DuplexChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplexChannel")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl DuplexChannel {
    /// Take ownership of `handle`. `label` only appears in logs and errors.
    pub fn new(label: &'static str, handle: RawHandle, ops: Arc<dyn PipeOps>) -> Self {
        Self {
            label,
            cell: AtomicIsize::new(handle),
            parked: Mutex::new(None),
            exclusive: Mutex::new(()),
            ops,
            poll_interval: READ_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_closed(&self) -> bool {
        self.cell.load(Ordering::Acquire) == CLOSED
    }

    /// Write `buf` to the pipe.
    ///
    /// Returns `Ok(0)` without touching the OS if the channel is closed.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let _guard = self.exclusive();
        let handle = self.cell.load(Ordering::Acquire);
        if handle == CLOSED {
            return Ok(0);
        }
        self.ops
            .write(handle, buf)
            .map_err(|e| self.context("writing to", e))
    }

    /// Wait for data, then read up to `buf.len()` bytes.
    ///
    /// Polls availability every poll interval without holding the lock, so
    /// a concurrent `mark_closed` or `close` ends the wait within one
    /// interval. Probe failures and zero-length reads are `EndOfStream`.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        if buf.is_empty() {
            return Ok(ReadOutcome::Data(0));
        }

        loop {
            let handle = self.cell.load(Ordering::Acquire);
            if handle == CLOSED {
                return Ok(ReadOutcome::EndOfStream);
            }
            match self.ops.available(handle) {
                Ok(0) => thread::sleep(self.poll_interval),
                Ok(_) => break,
                Err(e) => {
                    debug!(channel = self.label, "availability probe failed: {e}");
                    return Ok(ReadOutcome::EndOfStream);
                }
            }
        }

        let _guard = self.exclusive();
        let handle = self.cell.load(Ordering::Acquire);
        if handle == CLOSED {
            return Ok(ReadOutcome::EndOfStream);
        }
        let n = self
            .ops
            .read(handle, buf)
            .map_err(|e| self.context("reading from", e))?;
        Ok(if n == 0 {
            ReadOutcome::EndOfStream
        } else {
            ReadOutcome::Data(n)
        })
    }

    /// Bytes readable without blocking, or `None` once the channel is closed.
    pub fn available(&self) -> io::Result<Option<usize>> {
        let handle = self.cell.load(Ordering::Acquire);
        if handle == CLOSED {
            return Ok(None);
        }
        self.ops
            .available(handle)
            .map(Some)
            .map_err(|e| self.context("peeking", e))
    }

    /// Flip the channel to closed without taking the lock.
    ///
    /// In-flight and future operations see the closed state; the OS handle
    /// itself is released later by [`close`](Self::close) or `Drop`.
    pub fn mark_closed(&self) {
        // The swap and the park happen under `parked` so `take_owned` never
        // sees the cell closed before the handle is parked.
        let mut parked = self.parked();
        let previous = self.cell.swap(CLOSED, Ordering::AcqRel);
        if previous != CLOSED {
            *parked = Some(previous);
            debug!(channel = self.label, "channel marked closed");
        }
    }

    /// Release the OS handle. A second call is a no-op.
    pub fn close(&self) -> io::Result<()> {
        let _guard = self.exclusive();
        match self.take_owned() {
            None => Ok(()),
            Some(handle) => {
                debug!(channel = self.label, "releasing pipe handle");
                self.ops
                    .release(handle)
                    .map_err(|e| self.context("closing", e))
            }
        }
    }

    /// Detach whichever handle this channel still owns: the live one, or the
    /// one parked by `mark_closed`.
    fn take_owned(&self) -> Option<RawHandle> {
        let mut parked = self.parked();
        let live = self.cell.swap(CLOSED, Ordering::AcqRel);
        if live != CLOSED {
            return Some(live);
        }
        parked.take()
    }

    fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.exclusive.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parked(&self) -> MutexGuard<'_, Option<RawHandle>> {
        self.parked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context(&self, action: &str, err: io::Error) -> io::Error {
        io::Error::new(
            err.kind(),
            format!("IO error while {action} the {} pipe: {err}", self.label),
        )
    }
}

impl Drop for DuplexChannel {
    fn drop(&mut self) {
        if let Some(handle) = self.take_owned() {
            if let Err(e) = self.ops.release(handle) {
                warn!(channel = self.label, "failed to release pipe handle on drop: {e}");
            }
        }
    }
}
