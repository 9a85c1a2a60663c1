/*!
 * Pipe Types
 * Owned pipe ends and the errors raised while using them
 */

use nix::errno::Errno;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use thiserror::Error;

/// Pipe error types
#[derive(Debug, Error)]
pub enum PipeError {
    #[error("Pipe creation failed: {0}")]
    Create(#[source] Errno),

    #[error("Setting pipe capacity to {requested} bytes failed: {source}")]
    Capacity {
        requested: usize,
        #[source]
        source: Errno,
    },

    #[error("Short read: got {got} of {expected} bytes before end-of-stream")]
    ShortRead { got: usize, expected: usize },

    #[error("Broken pipe: the receiving stage has exited")]
    BrokenPipe,

    #[error("Would block: pipe buffer is full")]
    WouldBlock,

    #[error("Pipe I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl PipeError {
    /// Classify a failed write so the stage can tell a departed reader from a real fault
    pub(crate) fn from_write(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe => PipeError::BrokenPipe,
            io::ErrorKind::WouldBlock => PipeError::WouldBlock,
            _ => PipeError::Io(err),
        }
    }
}

/// Read side of a pipe. Owned by exactly one stage; closed on drop.
#[derive(Debug)]
pub struct ReceiveEnd {
    file: File,
}

impl ReceiveEnd {
    /// Read the next candidate, `None` on end-of-stream
    pub fn recv(&mut self) -> Result<Option<crate::core::types::Candidate>, PipeError> {
        super::codec::read_candidate(&mut self.file)
    }

    /// Explicit close; identical to dropping, but reads better at call sites
    pub fn close(self) {
        drop(self);
    }
}

impl From<OwnedFd> for ReceiveEnd {
    fn from(fd: OwnedFd) -> Self {
        Self { file: File::from(fd) }
    }
}

impl Read for ReceiveEnd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl AsFd for ReceiveEnd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for ReceiveEnd {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// Write side of a pipe. Dropping it is the end-of-stream signal downstream.
#[derive(Debug)]
pub struct SendEnd {
    file: File,
}

impl SendEnd {
    /// Forward one candidate
    pub fn send(&mut self, value: crate::core::types::Candidate) -> Result<(), PipeError> {
        super::codec::write_candidate(&mut self.file, value)
    }

    /// Make writes fail with `WouldBlock` instead of waiting for buffer space
    pub fn set_nonblocking(&self) -> Result<(), PipeError> {
        use nix::fcntl::{fcntl, FcntlArg, OFlag};

        let fd = self.file.as_raw_fd();
        let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(|e| PipeError::Io(e.into()))?;
        let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
        fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(|e| PipeError::Io(e.into()))?;
        Ok(())
    }

    pub fn close(self) {
        drop(self);
    }
}

impl From<OwnedFd> for SendEnd {
    fn from(fd: OwnedFd) -> Self {
        Self { file: File::from(fd) }
    }
}

impl Write for SendEnd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsFd for SendEnd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for SendEnd {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}
