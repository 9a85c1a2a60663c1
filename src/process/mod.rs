/*!
 * Process Module
 * Stage processes, their lifecycle, and the feeder that drives the chain
 */

pub mod child;
pub mod feeder;
pub mod stage;
pub mod types;

// Re-export for convenience
pub use child::{ChildStage, Forked};
pub use feeder::{run_pipeline, FeedOutcome, Feeder, PipelineReport};
pub use stage::{launch, Assignment, Flow, Stage, StageContext};
pub use types::{ChildExit, ProcessError, StageError, StageState, StageSummary};
