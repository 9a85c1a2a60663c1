/*!
 * Stage
 * One filtering step of the sieve, running in its own process
 *
 * A stage owns exactly one receive end. It reports the first value it reads
 * as a prime, drops multiples of that prime, and forwards survivors to a
 * next stage that it forks only when the first survivor shows up.
 *
 * Descriptor discipline after each fork:
 *
 *   parent: keeps its receive end and the new send end,
 *           closes the new receive end right away.
 *   child:  closes the new send end right away, and closes the parent's
 *           receive end (the trash end) before it reads anything.
 *
 * Forking happens in the middle of the parent's filter loop. Rather than
 * starting the next stage from that deep call, the child returns an
 * [`Assignment`] up to [`launch`], which runs it in a loop. Stack depth stays
 * constant no matter how long the chain gets, and every copy of the parent's
 * state is dropped on the way up.
 */

use super::child::{self, ChildStage, Forked};
use super::types::{ChildExit, StageError, StageState, StageSummary};
use crate::config::FaultPlan;
use crate::core::limits::{EXIT_OK, EXIT_STAGE_FAILED};
use crate::core::types::{Candidate, StageIndex};
use crate::ipc::pipe::{pipe, ReceiveEnd, SendEnd};
use crate::monitoring::stage_span;
use crate::output::{PrimeRecord, PrimeSink};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything a stage needs besides its descriptors. Copied into each child by fork.
#[derive(Debug)]
pub struct StageContext {
    pub run_id: Uuid,
    pub sink: PrimeSink,
    pub pipe_capacity: Option<usize>,
    pub faults: FaultPlan,
}

/// Descriptors a newly forked process inherits for its role
#[derive(Debug)]
pub struct Assignment {
    pub index: StageIndex,
    pub receive: ReceiveEnd,
    /// Receive end of the previous stage; absent for stage 1
    pub trash: Option<ReceiveEnd>,
}

impl Assignment {
    pub fn first(receive: ReceiveEnd) -> Self {
        Self {
            index: 1,
            receive,
            trash: None,
        }
    }
}

/// Where the next stage's survivors go
#[derive(Debug)]
enum Downstream {
    /// No survivor seen yet, so no pipe written to and no child forked
    Absent,
    Spawned { send: SendEnd, child: ChildStage },
}

impl Downstream {
    /// Close the send end, then wait for the child it feeds
    fn finish(self) -> Result<Option<ChildExit>, StageError> {
        match self {
            Downstream::Absent => Ok(None),
            Downstream::Spawned { send, child } => {
                send.close();
                Ok(Some(child.join()?))
            }
        }
    }
}

/// Result of running a stage in the current process
#[derive(Debug)]
pub enum Flow {
    /// Input exhausted, descriptors closed, child joined
    Drained(StageSummary),
    /// This process is the freshly forked child and must run the assignment
    Forked(Assignment),
}

/// How the filter loop ended
enum Consumed {
    Exhausted,
    Forked(Assignment),
}

/// Result of extending the chain by one stage
enum Extension {
    Parent {
        receive: ReceiveEnd,
        downstream: Downstream,
    },
    Child(Assignment),
}

/// One stage instance
#[derive(Debug)]
pub struct Stage<'a> {
    ctx: &'a StageContext,
    index: StageIndex,
    pid: i32,
    state: StageState,
    base: Option<Candidate>,
    received: u64,
    forwarded: u64,
}

/// Run stages in this process until one drains, and return the exit code.
///
/// Called once in every forked stage process.
pub fn launch(ctx: &StageContext, first: Assignment) -> i32 {
    let mut assignment = first;
    loop {
        let pid = nix::unistd::getpid().as_raw();
        let span = stage_span(&ctx.run_id, assignment.index, pid);
        let _entered = span.enter();

        let mut stage = Stage::new(ctx, assignment.index, pid);
        match stage.run(assignment) {
            Ok(Flow::Drained(summary)) => {
                info!(
                    base = ?summary.base,
                    received = summary.received,
                    forwarded = summary.forwarded,
                    child = ?summary.child,
                    "stage drained"
                );
                return EXIT_OK;
            }
            Ok(Flow::Forked(next)) => assignment = next,
            Err(e) => {
                error!(error = %e, "stage failed");
                return EXIT_STAGE_FAILED;
            }
        }
    }
}

impl<'a> Stage<'a> {
    pub fn new(ctx: &'a StageContext, index: StageIndex, pid: i32) -> Self {
        Self {
            ctx,
            index,
            pid,
            state: StageState::Spawned,
            base: None,
            received: 0,
            forwarded: 0,
        }
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    /// Run the full lifecycle for one assignment.
    ///
    /// Draining happens on every path except `Flow::Forked`, where this
    /// process has become the next stage and owns nothing of this one.
    pub fn run(&mut self, assignment: Assignment) -> Result<Flow, StageError> {
        let Assignment {
            receive, trash, ..
        } = assignment;

        if let Some(trash) = trash {
            trash.close();
        }

        let mut downstream = Downstream::Absent;
        let consumed = self.consume(receive, &mut downstream);
        if let Ok(Consumed::Forked(next)) = consumed {
            return Ok(Flow::Forked(next));
        }

        let entered = self.transition(StageState::Draining);
        let joined = downstream.finish();
        if let Ok(Some(exit)) = &joined {
            if !exit.success() {
                warn!(?exit, "downstream stage failed");
            }
        }

        consumed?;
        entered?;
        let child = joined?;
        self.transition(StageState::Terminated)?;

        Ok(Flow::Drained(StageSummary {
            index: self.index,
            base: self.base,
            received: self.received,
            forwarded: self.forwarded,
            child,
        }))
    }

    /// AWAITING_BASE and FILTERING. The receive end is closed on every return.
    fn consume(
        &mut self,
        mut receive: ReceiveEnd,
        downstream: &mut Downstream,
    ) -> Result<Consumed, StageError> {
        self.transition(StageState::AwaitingBase)?;

        if let Some(stall) = self.ctx.faults.stall_for(self.index) {
            debug!(delay_ms = stall.delay.as_millis() as u64, "stalling before first read");
            std::thread::sleep(stall.delay);
        }

        let Some(base) = receive.recv()? else {
            debug!("input ended before a base arrived");
            receive.close();
            return Ok(Consumed::Exhausted);
        };
        if base < 2 {
            return Err(StageError::InvalidBase(base));
        }

        self.received += 1;
        self.base = Some(base);
        tracing::Span::current().record("base", base);
        self.ctx
            .sink
            .emit(&PrimeRecord {
                prime: base,
                stage: self.index,
                pid: self.pid,
            })
            .map_err(StageError::Output)?;

        self.transition(StageState::Filtering)?;

        let crash = self.ctx.faults.crash_for(self.index);
        if crash.is_some_and(|c| c.after_forwarded == 0) {
            return Err(self.injected_crash());
        }

        while let Some(value) = receive.recv()? {
            self.received += 1;
            if value % base == 0 {
                continue;
            }

            if matches!(downstream, Downstream::Absent) {
                match self.extend_chain(receive)? {
                    Extension::Parent {
                        receive: kept,
                        downstream: spawned,
                    } => {
                        receive = kept;
                        *downstream = spawned;
                    }
                    Extension::Child(next) => return Ok(Consumed::Forked(next)),
                }
            }

            if let Downstream::Spawned { send, .. } = downstream {
                send.send(value)?;
                self.forwarded += 1;
            }

            if crash.is_some_and(|c| c.after_forwarded == self.forwarded) {
                return Err(self.injected_crash());
            }
        }

        receive.close();
        Ok(Consumed::Exhausted)
    }

    /// Create the send pipe and fork the next stage.
    ///
    /// The parent gets its receive end back; the child takes it as trash.
    fn extend_chain(&self, receive: ReceiveEnd) -> Result<Extension, StageError> {
        let next = self.index + 1;
        let (child_receive, send) = pipe(self.ctx.pipe_capacity)?;

        match child::fork(next)? {
            Forked::Parent(child) => {
                child_receive.close();
                debug!(next, child = child.pid(), "chain extended");
                Ok(Extension::Parent {
                    receive,
                    downstream: Downstream::Spawned { send, child },
                })
            }
            Forked::Child => {
                send.close();
                Ok(Extension::Child(Assignment {
                    index: next,
                    receive: child_receive,
                    trash: Some(receive),
                }))
            }
        }
    }

    fn transition(&mut self, next: StageState) -> Result<(), StageError> {
        if !self.state.can_transition_to(next) {
            return Err(super::types::ProcessError::InvalidStateTransition {
                from: self.state,
                to: next,
            }
            .into());
        }
        debug!(from = ?self.state, to = ?next, "stage state");
        self.state = next;
        Ok(())
    }

    fn injected_crash(&self) -> StageError {
        StageError::InjectedCrash {
            stage: self.index,
            forwarded: self.forwarded,
        }
    }
}
