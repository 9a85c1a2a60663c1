/*!
 * Feeder
 * Drives one pipeline run: spawns stage 1, streams candidates, waits for the chain
 */

use super::child::{self, ChildStage, Forked};
use super::stage::{self, Assignment, StageContext};
use super::types::{ChildExit, ProcessError};
use crate::config::SieveConfig;
use crate::core::errors::SieveError;
use crate::core::types::CandidateRange;
use crate::ipc::pipe::{pipe, PipeError, SendEnd};
use crate::monitoring::{generate_run_id, pipeline_span};
use crate::output::PrimeSink;
use nix::sys::signal::{signal, SigHandler, Signal};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    /// Candidates written into stage 1
    pub fed: u64,
    /// Feeding stopped early because stage 1 went away
    pub truncated: bool,
    /// Time from the first write until the entry pipe was closed
    pub feed_elapsed: Duration,
    /// How stage 1 (and so the whole chain) ended
    pub first_stage: ChildExit,
}

/// Writes the candidate stream into the entry pipe
#[derive(Debug)]
pub struct Feeder {
    send: SendEnd,
}

/// Result of streaming a range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOutcome {
    pub fed: u64,
    pub truncated: bool,
    pub elapsed: Duration,
}

impl Feeder {
    pub fn new(send: SendEnd) -> Self {
        Self { send }
    }

    /// Write every candidate in ascending order, then close the entry pipe.
    ///
    /// Blocks whenever the pipe buffer is full. A failed write means stage 1
    /// is gone; feeding stops and the outcome is marked truncated.
    pub fn feed(mut self, range: CandidateRange) -> FeedOutcome {
        let start = Instant::now();
        let mut fed = 0;
        let mut truncated = false;

        for value in range.iter() {
            match self.send.send(value) {
                Ok(()) => fed += 1,
                Err(PipeError::BrokenPipe) => {
                    warn!(value, fed, "stage 1 exited early, stopping feed");
                    truncated = true;
                    break;
                }
                Err(e) => {
                    warn!(value, fed, error = %e, "feed write failed, stopping feed");
                    truncated = true;
                    break;
                }
            }
        }

        self.send.close();
        FeedOutcome {
            fed,
            truncated,
            elapsed: start.elapsed(),
        }
    }
}

/// Run the sieve over `config.range`, writing prime lines to `sink`.
///
/// Returns once every stage has exited. Setup failures (the entry pipe or
/// stage 1 cannot be created) are errors; failures further down the chain
/// only truncate the output and show up in the report.
///
/// SIGPIPE is ignored for the duration of the call so that writes into a
/// departed stage fail with EPIPE. The caller's disposition is restored
/// before returning.
pub fn run_pipeline(config: &SieveConfig, sink: PrimeSink) -> Result<PipelineReport, SieveError> {
    config.validate()?;
    let _sigpipe = SigpipeGuard::ignore()?;

    let ctx = StageContext {
        run_id: generate_run_id(),
        sink,
        pipe_capacity: config.pipe_capacity,
        faults: config.faults,
    };
    let span = pipeline_span(&ctx.run_id, config.range);
    let _entered = span.enter();

    let (receive, send) = pipe(config.pipe_capacity)?;
    let first: ChildStage = match child::fork(1)? {
        Forked::Parent(child) => {
            receive.close();
            child
        }
        Forked::Child => {
            send.close();
            child::exit_with(|| stage::launch(&ctx, Assignment::first(receive)))
        }
    };

    let outcome = Feeder::new(send).feed(config.range);
    span.record("fed", outcome.fed);

    let first_stage = first.join()?;
    if !first_stage.success() {
        warn!(exit = ?first_stage, "stage 1 failed, output is truncated");
    }
    info!(
        fed = outcome.fed,
        truncated = outcome.truncated,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "pipeline finished"
    );

    Ok(PipelineReport {
        run_id: ctx.run_id.to_string(),
        fed: outcome.fed,
        truncated: outcome.truncated,
        feed_elapsed: outcome.elapsed,
        first_stage,
    })
}

/// Ignores SIGPIPE while alive and reinstalls the previous handler on drop.
/// Forked stages inherit the ignored disposition.
#[derive(Debug)]
struct SigpipeGuard {
    previous: SigHandler,
}

impl SigpipeGuard {
    fn ignore() -> Result<Self, ProcessError> {
        // SAFETY: installs SIG_IGN, no handler code runs
        let previous = unsafe { signal(Signal::SIGPIPE, SigHandler::SigIgn) }
            .map_err(ProcessError::Signal)?;
        Ok(Self { previous })
    }
}

impl Drop for SigpipeGuard {
    fn drop(&mut self) {
        // SAFETY: reinstalls the handler that was active before `ignore`
        if let Err(e) = unsafe { signal(Signal::SIGPIPE, self.previous) } {
            warn!(error = %e, "restoring SIGPIPE handler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limits::MIN_PIPE_CAPACITY;
    use crate::ipc::pipe::ReceiveEnd;
    use serial_test::serial;
    use std::thread;

    fn drain(mut receive: ReceiveEnd) -> Vec<u32> {
        let mut seen = Vec::new();
        while let Some(v) = receive.recv().unwrap() {
            seen.push(v);
        }
        seen
    }

    #[test]
    #[serial]
    fn test_feed_writes_range_and_closes() {
        let (receive, send) = pipe(None).unwrap();
        let reader = thread::spawn(move || drain(receive));

        let outcome = Feeder::new(send).feed(CandidateRange::new(2, 35));
        assert_eq!(outcome.fed, 34);
        assert!(!outcome.truncated);
        assert_eq!(reader.join().unwrap(), (2..=35).collect::<Vec<_>>());
    }

    #[test]
    #[serial]
    fn test_feed_stops_when_reader_gone() {
        let _sigpipe = SigpipeGuard::ignore().unwrap();
        let (receive, send) = pipe(None).unwrap();
        receive.close();

        let outcome = Feeder::new(send).feed(CandidateRange::new(2, 100));
        assert_eq!(outcome.fed, 0);
        assert!(outcome.truncated);
    }

    #[test]
    #[serial]
    fn test_full_pipe_blocks_feeder_until_reader_drains() {
        let stall = Duration::from_millis(200);
        let (receive, send) = pipe(Some(MIN_PIPE_CAPACITY)).unwrap();

        let reader = thread::spawn(move || {
            thread::sleep(stall);
            drain(receive)
        });

        // 8000 candidates are ~32KB, more than the pipe can buffer
        let outcome = Feeder::new(send).feed(CandidateRange::new(2, 8001));
        let seen = reader.join().unwrap();

        assert_eq!(seen.len(), 8000);
        assert!(
            outcome.elapsed >= stall.mul_f32(0.9),
            "feeder finished in {:?} while the reader was stalled",
            outcome.elapsed
        );
    }

    #[test]
    #[serial]
    fn test_run_restores_sigpipe_disposition() {
        // SAFETY: plain dispositions, no handler code runs
        let original = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) }.unwrap();

        let file = tempfile::tempfile().unwrap();
        let sink = PrimeSink::new(file, crate::output::OutputFormat::Text);
        let report = run_pipeline(&SieveConfig::new(2, 20), sink).unwrap();
        assert!(report.first_stage.success());

        let after = unsafe { signal(Signal::SIGPIPE, original) }.unwrap();
        assert_eq!(after, SigHandler::SigDfl);
    }

    #[test]
    #[serial]
    fn test_nonblocking_feed_hits_capacity() {
        let (_receive, mut send) = pipe(Some(MIN_PIPE_CAPACITY)).unwrap();
        send.set_nonblocking().unwrap();

        let mut written = 0usize;
        let err = loop {
            match send.send(written as u32) {
                Ok(()) => written += 1,
                Err(e) => break e,
            }
            assert!(written < 1 << 20, "pipe never filled up");
        };

        assert!(matches!(err, PipeError::WouldBlock));
        let capacity = crate::ipc::pipe::capacity_of(&send).unwrap_or(65536);
        assert!(written * crate::core::limits::WORD_WIDTH <= capacity);
    }
}
