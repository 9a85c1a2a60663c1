/*!
 * Structured Tracing
 * Tracing setup and spans that correlate log lines across forked stages
 *
 * Features:
 * - Run ID shared by every process of one pipeline run
 * - One root span per stage, so deep chains do not nest spans
 * - JSON-formatted logs for structured parsing
 */

use crate::core::types::{CandidateRange, StageIndex};
use tracing::{info, info_span, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize structured tracing on stderr; stdout carries only prime lines.
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: warn)
/// - SIEVE_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let use_json = std::env::var("SIEVE_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
        info!("Structured tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .init();
        info!("Structured tracing initialized");
    }
}

/// Generate a unique ID for one pipeline run
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}

/// Span covering the feeder for one run
pub fn pipeline_span(run_id: &Uuid, range: CandidateRange) -> Span {
    info_span!(
        "pipeline",
        run_id = %run_id,
        lo = range.lo,
        hi = range.hi,
        fed = tracing::field::Empty,
    )
}

/// Root span for one stage; `base` is recorded once it is known
pub fn stage_span(run_id: &Uuid, index: StageIndex, pid: i32) -> Span {
    info_span!(
        parent: None,
        "stage",
        run_id = %run_id,
        index,
        pid,
        base = tracing::field::Empty,
    )
}
