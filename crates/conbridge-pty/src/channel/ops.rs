//! Platform operations on a raw pipe handle.

use std::io;

/// An OS pipe handle: a Windows `HANDLE` value or a Unix file descriptor.
pub type RawHandle = isize;

/// Marker stored in place of a handle once a channel is closed. Never a
/// valid handle on either platform (`INVALID_HANDLE_VALUE` / fd `-1`).
pub const CLOSED: RawHandle = -1;

/// The four native calls a [`DuplexChannel`](super::DuplexChannel) needs.
///
/// Implementations never cache handles; every call gets the value the
/// channel read from its cell just before.
pub trait PipeOps: Send + Sync {
    /// Bytes that can be read right now without blocking.
    ///
    /// An error means the probe failed, which includes the peer having
    /// disconnected.
    fn available(&self, handle: RawHandle) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes. Only called after `available` reported
    /// data, so it returns without waiting.
    fn read(&self, handle: RawHandle, buf: &mut [u8]) -> io::Result<usize>;

    /// Write `buf`, returning how many bytes the transport accepted.
    fn write(&self, handle: RawHandle, buf: &[u8]) -> io::Result<usize>;

    /// Release the OS handle. Called at most once per handle.
    fn release(&self, handle: RawHandle) -> io::Result<()>;
}
