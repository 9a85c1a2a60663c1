/*!
 * Configuration
 * Command-line parsing, validated run settings and fault injection points
 *
 * Features:
 * - CLI argument parsing using clap derive macros
 * - Range bounds also read from SIEVE_LO / SIEVE_HI
 * - Crash and stall points that exercise failure and back-pressure paths
 */

use crate::core::errors::ConfigError;
use crate::core::limits::{DEFAULT_HI, MIN_CANDIDATE};
use crate::core::types::{Candidate, CandidateRange, StageIndex};
use crate::output::OutputFormat;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Concurrent Sieve of Eratosthenes, one process per prime
#[derive(Parser, Debug, Clone)]
#[command(
    name = "primes",
    version,
    about = "Concurrent Sieve of Eratosthenes, one process per prime",
    long_about = "Feeds the candidates lo..=hi into a chain of processes joined by pipes.\n\n\
                  Each stage prints the first number it receives as a prime, drops its\n\
                  multiples and forwards the rest to a stage it spawns on demand.",
    after_help = "EXAMPLES:\n    \
        primes\n    \
        primes --hi 100 --format json\n    \
        primes --hi 1000 --pipe-capacity 4096\n    \
        primes --crash-stage 2 --crash-after 3   # truncate the chain on purpose"
)]
pub struct CliArgs {
    /// First candidate fed into the pipeline
    #[arg(long, env = "SIEVE_LO", default_value_t = MIN_CANDIDATE, value_name = "NUM")]
    pub lo: Candidate,

    /// Last candidate fed into the pipeline (inclusive)
    #[arg(long, env = "SIEVE_HI", default_value_t = DEFAULT_HI, value_name = "NUM")]
    pub hi: Candidate,

    /// Output line format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Kernel buffer size for every pipe in the chain (Linux only)
    #[arg(long, value_name = "BYTES")]
    pub pipe_capacity: Option<usize>,

    /// Make this stage fail after forwarding --crash-after survivors
    #[arg(long, value_name = "STAGE", requires = "crash_after")]
    pub crash_stage: Option<StageIndex>,

    /// Survivors the crashing stage forwards before failing
    #[arg(long, value_name = "NUM", requires = "crash_stage")]
    pub crash_after: Option<u64>,

    /// Make this stage sleep before its first read
    #[arg(long, value_name = "STAGE", requires = "stall_ms")]
    pub stall_stage: Option<StageIndex>,

    /// How long the stalled stage sleeps
    #[arg(long, value_name = "MS", requires = "stall_stage")]
    pub stall_ms: Option<u64>,
}

/// Stage that fails on purpose after forwarding `after_forwarded` survivors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashPoint {
    pub stage: StageIndex,
    pub after_forwarded: u64,
}

/// Stage that sleeps before reading anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StallPoint {
    pub stage: StageIndex,
    pub delay: Duration,
}

/// Injected faults; empty in normal runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPlan {
    pub crash: Option<CrashPoint>,
    pub stall: Option<StallPoint>,
}

impl FaultPlan {
    pub fn crash_for(&self, stage: StageIndex) -> Option<CrashPoint> {
        self.crash.filter(|c| c.stage == stage)
    }

    pub fn stall_for(&self, stage: StageIndex) -> Option<StallPoint> {
        self.stall.filter(|s| s.stage == stage)
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SieveConfig {
    pub range: CandidateRange,
    pub format: OutputFormat,
    pub pipe_capacity: Option<usize>,
    pub faults: FaultPlan,
}

impl SieveConfig {
    /// Configuration for `lo..=hi` with everything else defaulted
    pub fn new(lo: Candidate, hi: Candidate) -> Self {
        Self {
            range: CandidateRange::new(lo, hi),
            format: OutputFormat::default(),
            pipe_capacity: None,
            faults: FaultPlan::default(),
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_pipe_capacity(mut self, bytes: usize) -> Self {
        self.pipe_capacity = Some(bytes);
        self
    }

    pub fn with_crash(mut self, stage: StageIndex, after_forwarded: u64) -> Self {
        self.faults.crash = Some(CrashPoint {
            stage,
            after_forwarded,
        });
        self
    }

    pub fn with_stall(mut self, stage: StageIndex, delay: Duration) -> Self {
        self.faults.stall = Some(StallPoint { stage, delay });
        self
    }

    /// Build from parsed CLI arguments
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = Self::new(args.lo, args.hi).with_format(args.format);
        config.pipe_capacity = args.pipe_capacity;

        match (args.crash_stage, args.crash_after) {
            (Some(stage), Some(after)) => config = config.with_crash(stage, after),
            (None, None) => {}
            _ => return Err(ConfigError::IncompleteFault("crash")),
        }

        match (args.stall_stage, args.stall_ms) {
            (Some(stage), Some(ms)) => config = config.with_stall(stage, Duration::from_millis(ms)),
            (None, None) => {}
            _ => return Err(ConfigError::IncompleteFault("stall")),
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.range.lo < MIN_CANDIDATE {
            return Err(ConfigError::RangeStart(self.range.lo));
        }
        if self.faults.crash.is_some_and(|c| c.stage == 0) {
            return Err(ConfigError::StageIndex("crash"));
        }
        if self.faults.stall.is_some_and(|s| s.stage == 0) {
            return Err(ConfigError::StageIndex("stall"));
        }
        Ok(())
    }
}

impl Default for SieveConfig {
    fn default() -> Self {
        Self::new(MIN_CANDIDATE, DEFAULT_HI)
    }
}
