/*!
 * Stage Processes
 * Forking stage processes and reaping them
 */

use super::types::{ChildExit, ProcessError, ProcessResult};
use crate::core::limits::EXIT_PANICKED;
use crate::core::types::StageIndex;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{ForkResult, Pid as NixPid};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Which side of a fork the caller is now on
#[derive(Debug)]
pub enum Forked {
    /// Still the original process; holds the handle of the new one
    Parent(ChildStage),
    /// The new process
    Child,
}

/// Handle to exactly one forked stage. Joined by its parent before the parent exits.
#[derive(Debug)]
pub struct ChildStage {
    pid: NixPid,
    index: StageIndex,
    reaped: bool,
}

/// Fork the process that will run stage `index`.
///
/// The child continues from this call on the same thread and must leave
/// through [`exit_with`], so it never returns into frames that belong to
/// the caller of the pipeline.
pub fn fork(index: StageIndex) -> ProcessResult<Forked> {
    // SAFETY: the child only keeps running the pipeline on the forking
    // thread and ends in `libc::_exit`; it never touches state owned by other threads.
    match unsafe { nix::unistd::fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!(index, child = child.as_raw(), "stage forked");
            Ok(Forked::Parent(ChildStage {
                pid: child,
                index,
                reaped: false,
            }))
        }
        Ok(ForkResult::Child) => Ok(Forked::Child),
        Err(source) => Err(ProcessError::ForkFailed { index, source }),
    }
}

/// Run a forked child's body and terminate the process with its exit code.
///
/// Panics are caught and become `EXIT_PANICKED`; destructors of frames
/// above this call do not run.
pub fn exit_with<F>(body: F) -> !
where
    F: FnOnce() -> i32,
{
    let code = panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or(EXIT_PANICKED);
    // SAFETY: ends the process immediately; no exit handlers or destructors run
    unsafe { nix::libc::_exit(code) }
}

impl ChildStage {
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// Wait for this child, and only this child, to exit
    pub fn join(mut self) -> ProcessResult<ChildExit> {
        let exit = wait_for(self.pid)?;
        self.reaped = true;
        debug!(index = self.index, pid = self.pid(), ?exit, "stage joined");
        Ok(exit)
    }
}

impl Drop for ChildStage {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        warn!(
            index = self.index,
            pid = self.pid(),
            "stage handle dropped without join, reaping"
        );
        if let Err(e) = wait_for(self.pid) {
            warn!(index = self.index, error = %e, "reaping stage failed");
        }
    }
}

fn wait_for(pid: NixPid) -> ProcessResult<ChildExit> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ChildExit::Exited(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(ChildExit::Signaled(signal as i32)),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(source) => {
                return Err(ProcessError::WaitFailed {
                    pid: pid.as_raw(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn spawn_exiting(code: i32) -> ChildStage {
        match fork(1).unwrap() {
            Forked::Parent(child) => child,
            Forked::Child => exit_with(|| code),
        }
    }

    #[test]
    #[serial]
    fn test_join_reports_exit_code() {
        let child = spawn_exiting(0);
        assert!(child.pid() > 0);
        assert_eq!(child.join().unwrap(), ChildExit::Exited(0));

        let child = spawn_exiting(3);
        assert_eq!(child.join().unwrap(), ChildExit::Exited(3));
    }

    #[test]
    #[serial]
    fn test_panicking_child_exits_with_panic_code() {
        let child = match fork(1).unwrap() {
            Forked::Parent(child) => child,
            Forked::Child => exit_with(|| panic!("stage body failed")),
        };
        assert_eq!(child.join().unwrap(), ChildExit::Exited(EXIT_PANICKED));
    }

    #[test]
    #[serial]
    fn test_dropped_handle_is_reaped() {
        let child = spawn_exiting(0);
        let pid = NixPid::from_raw(child.pid());
        drop(child);

        // Already reaped, so the pid is no longer our child
        assert_eq!(waitpid(pid, None), Err(Errno::ECHILD));
    }
}
