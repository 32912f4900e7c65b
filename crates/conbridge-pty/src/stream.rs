//! `std::io` adapters over a shared [`DuplexChannel`].
//!
//! Each adapter exposes one capability of the channel. Neither owns the OS
//! handle; the session releases it.

use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::channel::{DuplexChannel, ReadOutcome};

/// Bytes coming from the child.
#[derive(Debug, Clone)]
pub struct ChannelReader {
    channel: Arc<DuplexChannel>,
}

impl ChannelReader {
    pub fn new(channel: Arc<DuplexChannel>) -> Self {
        Self { channel }
    }

    /// Bytes readable without waiting. `0` once closed.
    pub fn available(&self) -> io::Result<usize> {
        Ok(self.channel.available()?.unwrap_or(0))
    }

    /// Stop reading. A read in progress returns end of stream within one
    /// poll interval; this call never waits for it.
    pub fn close(&self) {
        self.channel.mark_closed();
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.channel.read(buf)? {
            ReadOutcome::Data(n) => Ok(n),
            ReadOutcome::EndOfStream => Ok(0),
        }
    }
}

/// Bytes going to the child.
#[derive(Debug, Clone)]
pub struct ChannelWriter {
    channel: Arc<DuplexChannel>,
}

impl ChannelWriter {
    pub fn new(channel: Arc<DuplexChannel>) -> Self {
        Self { channel }
    }

    /// Release the input channel; the child sees end of input.
    pub fn close(&self) -> io::Result<()> {
        self.channel.close()
    }
}

impl Write for ChannelWriter {
    /// `Ok(0)` once closed, which `write_all` reports as `WriteZero`.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.channel.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
