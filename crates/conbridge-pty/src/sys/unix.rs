//! FIFO and pipe descriptors.

use std::io;
use std::os::unix::io::{BorrowedFd, RawFd};

use nix::errno::Errno;
use nix::libc;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd::{close, read, write};

use crate::channel::{PipeOps, RawHandle};

nix::ioctl_read_bad!(fionread, libc::FIONREAD, libc::c_int);

/// [`PipeOps`] over raw file descriptors.
///
/// `available` reports a hang-up with nothing left to read as an error, so
/// a polling reader ends once every writer is gone.
#[derive(Debug, Default, Clone, Copy)]
pub struct FdPipeOps;

fn as_fd(handle: RawHandle) -> io::Result<RawFd> {
    RawFd::try_from(handle).map_err(|_| io::Error::from(Errno::EBADF))
}

fn nix_error(err: Errno) -> io::Error {
    io::Error::from(err)
}

impl PipeOps for FdPipeOps {
    fn available(&self, handle: RawHandle) -> io::Result<usize> {
        let fd = as_fd(handle)?;

        let mut pending: libc::c_int = 0;
        // SAFETY: FIONREAD writes one c_int through the pointer.
        unsafe { fionread(fd, &mut pending) }.map_err(nix_error)?;
        if pending > 0 {
            return Ok(pending as usize);
        }

        // SAFETY: the channel keeps fd open for the duration of this call.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
        let ready = poll(&mut fds, PollTimeout::ZERO).map_err(nix_error)?;
        let revents = fds[0].revents().unwrap_or(PollFlags::empty());
        if ready > 0
            && revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL)
        {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe has no writers left",
            ));
        }
        Ok(0)
    }

    fn read(&self, handle: RawHandle, buf: &mut [u8]) -> io::Result<usize> {
        read(as_fd(handle)?, buf).map_err(nix_error)
    }

    fn write(&self, handle: RawHandle, buf: &[u8]) -> io::Result<usize> {
        let fd = as_fd(handle)?;
        // SAFETY: the channel keeps fd open for the duration of this call.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        write(borrowed, buf).map_err(nix_error)
    }

    fn release(&self, handle: RawHandle) -> io::Result<()> {
        close(as_fd(handle)?).map_err(nix_error)
    }
}
