/*!
 * primes - Main Entry Point
 *
 * Feeds a candidate range into the process pipeline and waits for it to
 * unwind. Prime lines go to stdout, diagnostics to stderr.
 */

use clap::Parser;
use tracing::info;

use prime_pipeline::{init_tracing, run_pipeline, CliArgs, PrimeSink, SieveConfig, SieveError};

fn main() -> miette::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let config = SieveConfig::from_args(&args).map_err(SieveError::from)?;
    info!(lo = config.range.lo, hi = config.range.hi, format = ?config.format, "starting pipeline");

    let sink = PrimeSink::stdout(config.format).map_err(SieveError::Output)?;
    let report = run_pipeline(&config, sink)?;

    info!(
        run_id = %report.run_id,
        fed = report.fed,
        truncated = report.truncated,
        first_stage = ?report.first_stage,
        "pipeline complete"
    );

    // Downstream failures only truncate the output; the feeder still succeeds
    Ok(())
}
