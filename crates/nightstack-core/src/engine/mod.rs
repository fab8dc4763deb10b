pub mod script;
mod siril;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_ENGINE_PROGRAM, DEFAULT_ENGINE_REQUIRES};
use crate::error::Result;

pub use script::{Directive, Script};
pub use siril::SirilEngine;

/// What an engine invocation left behind.
#[derive(Clone, Debug, Default)]
pub struct EngineOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    /// Advisory only; warnings show up here even on success.
    pub stderr: String,
}

impl EngineOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// The external tool doing the pixel work.
///
/// `run` blocks until the engine exits. It returns `Ok` for any exit status;
/// callers decide what a nonzero status means for their stage. `Err` is only
/// for failing to start the engine at all.
pub trait ProcessingEngine: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, workdir: &Path, script: &Script) -> Result<EngineOutput>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable to invoke.
    pub program: String,
    /// Minimum engine version, emitted as the first script line.
    pub requires: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_ENGINE_PROGRAM.to_string(),
            requires: Some(DEFAULT_ENGINE_REQUIRES.to_string()),
        }
    }
}

/// Engine described by `config`.
pub fn create_engine(config: &EngineConfig) -> Arc<dyn ProcessingEngine> {
    Arc::new(SirilEngine::new(&config.program))
}
