/*!
 * Process Types
 * Stage states, exit reports, and the errors raised by stage processes
 */

use crate::core::types::{Candidate, StageIndex};
use crate::ipc::pipe::PipeError;
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process operation result
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process-level errors (creation, reaping, lifecycle)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Fork for stage {index} failed: {source}")]
    ForkFailed {
        index: StageIndex,
        #[source]
        source: Errno,
    },

    #[error("Waiting for pid {pid} failed: {source}")]
    WaitFailed {
        pid: i32,
        #[source]
        source: Errno,
    },

    #[error("Changing signal disposition failed: {0}")]
    Signal(#[source] Errno),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: StageState, to: StageState },
}

/// Errors that end a stage. The stage still drains before it exits.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Pipe(#[from] PipeError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Writing prime line failed: {0}")]
    Output(#[source] std::io::Error),

    #[error("Received {0} as base; bases must be at least 2")]
    InvalidBase(Candidate),

    #[error("Injected crash in stage {stage} after forwarding {forwarded} survivors")]
    InjectedCrash { stage: StageIndex, forwarded: u64 },
}

/// Lifecycle of one stage process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Forked, still holding descriptors that belong to the previous stage
    Spawned,
    /// Waiting for the first value, which becomes the base prime
    AwaitingBase,
    /// Dropping multiples of the base and forwarding survivors
    Filtering,
    /// Closing descriptors and joining the spawned child
    Draining,
    /// About to exit
    Terminated,
}

impl StageState {
    pub fn can_transition_to(self, next: StageState) -> bool {
        use StageState::*;
        matches!(
            (self, next),
            (Spawned, AwaitingBase)
                | (AwaitingBase, Filtering)
                | (AwaitingBase, Draining)
                | (Filtering, Draining)
                | (Draining, Terminated)
        )
    }
}

/// How a reaped child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ChildExit {
    Exited(i32),
    Signaled(i32),
}

impl ChildExit {
    pub fn success(&self) -> bool {
        matches!(self, ChildExit::Exited(0))
    }
}

/// What a stage did, logged when it terminates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub index: StageIndex,
    pub base: Option<Candidate>,
    pub received: u64,
    pub forwarded: u64,
    pub child: Option<ChildExit>,
}
