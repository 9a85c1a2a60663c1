/*!
 * Pipe Creation
 * OS pipes with close-on-exec and an optional bounded capacity
 */

use super::types::{PipeError, ReceiveEnd, SendEnd};
use crate::core::limits::MIN_PIPE_CAPACITY;
use std::os::fd::OwnedFd;
use tracing::debug;

/// Create a pipe and split it into its owned ends.
///
/// `capacity` bounds the kernel buffer where the platform allows it; the
/// buffer size is the only flow control between stages.
pub fn pipe(capacity: Option<usize>) -> Result<(ReceiveEnd, SendEnd), PipeError> {
    let (read, write) = raw_pipe().map_err(PipeError::Create)?;

    if let Some(requested) = capacity {
        set_capacity(&write, requested.max(MIN_PIPE_CAPACITY))?;
    }

    Ok((ReceiveEnd::from(read), SendEnd::from(write)))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn raw_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn raw_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe()
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn set_capacity(fd: &OwnedFd, requested: usize) -> Result<(), PipeError> {
    use nix::fcntl::{fcntl, FcntlArg};
    use std::os::fd::AsRawFd;

    let size = libc_int(requested);
    let granted = fcntl(fd.as_raw_fd(), FcntlArg::F_SETPIPE_SZ(size))
        .map_err(|source| PipeError::Capacity { requested, source })?;
    debug!(requested, granted, "pipe capacity set");
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn set_capacity(_fd: &OwnedFd, requested: usize) -> Result<(), PipeError> {
    debug!(requested, "pipe capacity is fixed on this platform, ignoring");
    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn libc_int(value: usize) -> std::os::raw::c_int {
    std::os::raw::c_int::try_from(value).unwrap_or(std::os::raw::c_int::MAX)
}

/// Kernel buffer size of a pipe end, where the platform reports it
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn capacity_of<F: std::os::fd::AsRawFd>(end: &F) -> Option<usize> {
    use nix::fcntl::{fcntl, FcntlArg};

    fcntl(end.as_raw_fd(), FcntlArg::F_GETPIPE_SZ)
        .ok()
        .and_then(|n| usize::try_from(n).ok())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn capacity_of<F: std::os::fd::AsRawFd>(_end: &F) -> Option<usize> {
    None
}
