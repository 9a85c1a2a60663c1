/*!
 * Monitoring
 * Tracing setup and run/stage spans
 */

mod tracer;

pub use tracer::{generate_run_id, init_tracing, pipeline_span, stage_span};
