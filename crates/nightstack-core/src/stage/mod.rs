//! Running one pipeline stage: cache gate, scratch workspace, engine call,
//! output check.

mod calibration;
mod stacking;
pub mod workspace;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{all_exist, Artifact};
use crate::engine::{ProcessingEngine, Script};
use crate::error::{NightstackError, Result};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::ProgressReporter;

pub use calibration::{
    bias_outputs, calibrated_sequences, flat_outputs, light_outputs, CalibratedLights,
    ChannelSequence,
};
pub use stacking::{renormalize_outputs, stack_path};
pub use workspace::{ScratchWorkspace, StageInput};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    MasterBias,
    MasterFlat,
    CalibratedLights,
    ChannelStack,
    Renormalize,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MasterBias => write!(f, "Master bias"),
            Self::MasterFlat => write!(f, "Master flat"),
            Self::CalibratedLights => write!(f, "Calibrating lights"),
            Self::ChannelStack => write!(f, "Stacking channel"),
            Self::Renormalize => write!(f, "Renormalizing"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    /// Every output was already on disk; the engine was not invoked.
    Cached,
    /// The engine ran and produced every output.
    Built,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached => write!(f, "cached"),
            Self::Built => write!(f, "built"),
        }
    }
}

/// What a stage resolved to.
#[derive(Clone, Debug)]
pub struct StageResult {
    pub kind: StageKind,
    /// Human-readable identity, e.g. `master flat 2025-09-16/HaOiii`.
    pub label: String,
    pub outcome: StageOutcome,
    pub outputs: Vec<PathBuf>,
}

/// Inputs and script of a stage that has to run.
pub(crate) struct Job {
    pub(crate) inputs: Vec<StageInput>,
    pub(crate) script: Script,
}

/// Resolves stages against the cache and runs the engine for the rest.
pub struct StageRunner<'a> {
    config: &'a PipelineConfig,
    engine: Arc<dyn ProcessingEngine>,
    reporter: Arc<dyn ProgressReporter>,
}

impl<'a> StageRunner<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        engine: Arc<dyn ProcessingEngine>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            config,
            engine,
            reporter,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.config
    }

    fn script(&self) -> Script {
        Script::new(self.config.engine.requires.as_deref())
    }

    /// Return the cached outputs, or build the job and run it.
    ///
    /// `build` is only called on a cache miss, so a cached stage needs none
    /// of its raw inputs to still be on disk. With `force` the cache is
    /// bypassed.
    pub(crate) fn resolve(
        &self,
        kind: StageKind,
        label: String,
        outputs: Vec<Artifact>,
        force: bool,
        build: impl FnOnce() -> Result<Job>,
    ) -> Result<StageResult> {
        self.reporter.begin_stage(kind, &label);

        let resolved = if !force && all_exist(&outputs) {
            info!(stage = %label, "Using existing artifacts");
            Ok(StageOutcome::Cached)
        } else {
            if force {
                info!(stage = %label, "Rebuilding, an input was rebuilt");
            }
            build()
                .and_then(|job| self.execute(&label, &outputs, job))
                .map(|()| StageOutcome::Built)
        };
        let outcome = match resolved {
            Ok(outcome) => outcome,
            Err(e) => {
                self.reporter.fail_stage(kind, &e);
                return Err(e);
            }
        };

        self.reporter.finish_stage(kind, outcome);
        Ok(StageResult {
            kind,
            label,
            outcome,
            outputs: outputs.iter().map(Artifact::path).collect(),
        })
    }

    fn execute(&self, label: &str, outputs: &[Artifact], job: Job) -> Result<()> {
        for artifact in outputs {
            let dir = match artifact {
                Artifact::File(path) => path.parent().map(PathBuf::from),
                Artifact::Sequence { dir, .. } => Some(dir.clone()),
            };
            if let Some(dir) = dir {
                std::fs::create_dir_all(dir)?;
            }
        }

        let scratch = self.config.paths.scratch.as_deref();
        let workspace = ScratchWorkspace::create(scratch, &job.inputs)?;
        info!(
            stage = %label,
            inputs = job.inputs.len(),
            workdir = %workspace.path().display(),
            "Running {}",
            self.engine.name()
        );

        let output = self.engine.run(workspace.path(), &job.script)?;
        if !output.success() {
            let diagnostic = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(NightstackError::EngineFailure {
                stage: label.to_string(),
                inputs: job.inputs.iter().map(|i| i.path.clone()).collect(),
                status: output.status,
                diagnostic,
            });
        }

        if let Some(missing) = outputs.iter().find(|a| !a.exists()) {
            warn!(stage = %label, missing = %missing, "Expected output not written");
            return Err(NightstackError::MissingOutput {
                stage: label.to_string(),
                path: missing.path(),
            });
        }
        Ok(())
    }
}
