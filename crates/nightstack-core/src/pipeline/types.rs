use std::path::PathBuf;

use crate::error::NightstackError;
use crate::stage::{StageKind, StageOutcome, StageResult};

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive spinners, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A stage is being resolved. `label` names the artifact it is about.
    fn begin_stage(&self, _stage: StageKind, _label: &str) {}

    /// The stage resolved, either from the cache or by running the engine.
    fn finish_stage(&self, _stage: StageKind, _outcome: StageOutcome) {}

    /// The stage failed; the run is about to abort.
    fn fail_stage(&self, _stage: StageKind, _error: &NightstackError) {}
}

/// No-op progress reporter, used when `run_pipeline` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Every stage a run resolved, in execution order.
#[derive(Clone, Debug)]
pub struct PipelineReport {
    pub target: String,
    pub stages: Vec<StageResult>,
}

impl PipelineReport {
    pub(super) fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            stages: Vec::new(),
        }
    }

    /// Stages that ran the engine.
    pub fn built(&self) -> impl Iterator<Item = &StageResult> {
        self.stages
            .iter()
            .filter(|s| s.outcome == StageOutcome::Built)
    }

    pub fn built_count(&self) -> usize {
        self.built().count()
    }

    pub fn cached_count(&self) -> usize {
        self.stages.len() - self.built_count()
    }

    pub fn of_kind(&self, kind: StageKind) -> impl Iterator<Item = &StageResult> {
        self.stages.iter().filter(move |s| s.kind == kind)
    }

    /// Final renormalized images.
    pub fn deliverables(&self) -> Vec<PathBuf> {
        self.of_kind(StageKind::Renormalize)
            .flat_map(|s| s.outputs.iter().cloned())
            .collect()
    }
}

/// One stage as the next run would see it.
#[derive(Clone, Debug)]
pub struct PlannedStage {
    pub kind: StageKind,
    pub label: String,
    pub outputs: Vec<PathBuf>,
    /// Would be served from the cache.
    pub cached: bool,
}

/// What a run would do, computed without invoking the engine.
#[derive(Clone, Debug)]
pub struct PipelinePlan {
    pub target: String,
    pub stages: Vec<PlannedStage>,
}

impl PipelinePlan {
    pub fn pending(&self) -> impl Iterator<Item = &PlannedStage> {
        self.stages.iter().filter(|s| !s.cached)
    }

    pub fn is_complete(&self) -> bool {
        self.pending().next().is_none()
    }
}
