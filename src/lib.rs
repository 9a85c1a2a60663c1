/*!
 * Prime Pipeline Library
 * Concurrent Sieve of Eratosthenes as a self-extending chain of processes
 */

pub mod config;
pub mod core;
pub mod ipc;
pub mod monitoring;
pub mod output;
pub mod process;

// Re-exports
pub use config::{CliArgs, CrashPoint, FaultPlan, SieveConfig, StallPoint};
pub use crate::core::errors::{ConfigError, SieveError};
pub use crate::core::types::{Candidate, CandidateRange, StageIndex};
pub use monitoring::init_tracing;
pub use output::{parse_line, OutputFormat, PrimeRecord, PrimeSink};
pub use process::{run_pipeline, PipelineReport};
