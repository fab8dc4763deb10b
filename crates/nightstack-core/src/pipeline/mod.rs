pub mod config;
mod orchestrator;
mod plan;
mod types;

pub use orchestrator::{resolve_bias_date, run_pipeline, run_pipeline_reported};
pub use plan::plan_pipeline;
pub use types::{PipelinePlan, PipelineReport, PlannedStage, ProgressReporter};
