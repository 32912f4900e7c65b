//! Named pipes and process handles.

use std::ffi::c_void;
use std::io;

use tracing::warn;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Storage::FileSystem::{ReadFile, WriteFile};
use windows::Win32::System::Pipes::PeekNamedPipe;
use windows::Win32::System::Threading::{GetExitCodeProcess, GetProcessId, TerminateProcess};

use crate::channel::{PipeOps, RawHandle};

/// `GetExitCodeProcess` reports this while the process is still running.
const STILL_ACTIVE: u32 = 259;

fn to_handle(raw: RawHandle) -> HANDLE {
    HANDLE(raw as *mut c_void)
}

/// [`PipeOps`] over the agent's named pipes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NamedPipeOps;

impl PipeOps for NamedPipeOps {
    fn available(&self, handle: RawHandle) -> io::Result<usize> {
        let mut avail: u32 = 0;
        // SAFETY: only the total-available out parameter is supplied.
        unsafe { PeekNamedPipe(to_handle(handle), None, 0, None, Some(&mut avail), None)? };
        Ok(avail as usize)
    }

    fn read(&self, handle: RawHandle, buf: &mut [u8]) -> io::Result<usize> {
        let mut read: u32 = 0;
        // SAFETY: synchronous read into a live buffer.
        unsafe { ReadFile(to_handle(handle), Some(buf), Some(&mut read), None)? };
        Ok(read as usize)
    }

    fn write(&self, handle: RawHandle, buf: &[u8]) -> io::Result<usize> {
        let mut written: u32 = 0;
        // SAFETY: synchronous write from a live buffer.
        unsafe { WriteFile(to_handle(handle), Some(buf), Some(&mut written), None)? };
        Ok(written as usize)
    }

    fn release(&self, handle: RawHandle) -> io::Result<()> {
        // SAFETY: the channel owns the handle and releases it once.
        unsafe { CloseHandle(to_handle(handle))? };
        Ok(())
    }
}

/// Owned child process handle. Closed on drop.
pub(crate) struct ProcessHandle {
    handle: HANDLE,
}

// SAFETY: a process HANDLE is a kernel object reference usable from any thread.
unsafe impl Send for ProcessHandle {}
unsafe impl Sync for ProcessHandle {}

impl ProcessHandle {
    /// Take ownership of `handle`.
    ///
    /// # Safety
    ///
    /// `handle` must be a valid process handle not owned by anything else.
    pub(crate) unsafe fn from_raw(handle: *mut c_void) -> Self {
        Self {
            handle: HANDLE(handle),
        }
    }

    /// `Ok(None)` while the process is still running.
    pub(crate) fn exit_code(&self) -> io::Result<Option<i32>> {
        let mut code: u32 = 0;
        // SAFETY: handle is owned and open.
        unsafe { GetExitCodeProcess(self.handle, &mut code)? };
        if code == STILL_ACTIVE {
            Ok(None)
        } else {
            Ok(Some(code as i32))
        }
    }

    pub(crate) fn terminate(&self) -> io::Result<()> {
        // SAFETY: handle is owned and open.
        unsafe { TerminateProcess(self.handle, 1)? };
        Ok(())
    }

    pub(crate) fn pid(&self) -> Option<u32> {
        // SAFETY: handle is owned and open.
        match unsafe { GetProcessId(self.handle) } {
            0 => None,
            pid => Some(pid),
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // SAFETY: closed exactly once, here.
        if let Err(e) = unsafe { CloseHandle(self.handle) } {
            warn!("failed to close process handle: {e}");
        }
    }
}
