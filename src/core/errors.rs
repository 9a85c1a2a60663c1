/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use thiserror::Error;

// Re-export the layer-local errors so callers have one import path
pub use crate::ipc::pipe::PipeError;
pub use crate::process::types::{ProcessError, StageError};

/// Configuration errors raised before any process is created
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Range start {0} is below 2")]
    #[diagnostic(
        code(config::range_start),
        help("The sieve only makes sense for candidates >= 2. Pass --lo 2 or higher.")
    )]
    RangeStart(u32),

    #[error("Stage index 0 is not valid for {0}")]
    #[diagnostic(
        code(config::stage_index),
        help("Stages are numbered from 1; stage 1 reads directly from the feeder.")
    )]
    StageIndex(&'static str),

    #[error("Incomplete fault plan: {0}")]
    #[diagnostic(
        code(config::fault_plan),
        help("--crash-stage needs --crash-after, --stall-stage needs --stall-ms.")
    )]
    IncompleteFault(&'static str),
}

/// Unified pipeline error with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum SieveError {
    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("Pipe error: {0}")]
    #[diagnostic(
        code(sieve::pipe),
        help("Pipe creation or I/O failed. Check the open file limit (ulimit -n).")
    )]
    Pipe(#[from] PipeError),

    #[error("Process error: {0}")]
    #[diagnostic(
        code(sieve::process),
        help("Process creation failed. Check the process limit (ulimit -u).")
    )]
    Process(#[from] ProcessError),

    #[error("Output error: {0}")]
    #[diagnostic(
        code(sieve::output),
        help("The prime stream could not be opened or written.")
    )]
    Output(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: SieveError = ConfigError::RangeStart(1).into();
        assert!(matches!(err, SieveError::Config(ConfigError::RangeStart(1))));
        assert!(err.to_string().contains("below 2"));
    }

    #[test]
    fn test_pipe_error_converts() {
        let err: SieveError = PipeError::ShortRead { got: 3, expected: 4 }.into();
        assert!(matches!(err, SieveError::Pipe(PipeError::ShortRead { .. })));
        assert!(err.to_string().contains("3 of 4"));
    }
}
