pub mod config;
pub mod pipeline;
pub mod plan;
pub mod sessions;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use nightstack_core::pipeline::config::{PathsConfig, PipelineConfig};
use tracing::debug;

/// Where the pipeline config comes from. Flags override the file.
#[derive(Args)]
pub struct TargetArgs {
    /// Pipeline config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Target name as it appears in the repository, e.g. "NGC 281"
    #[arg(short, long)]
    pub target: Option<String>,

    /// Raw frame repository root
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// Working directory for masters, sequences and deliverables
    #[arg(long)]
    pub work: Option<PathBuf>,

    /// Calibration date whose bias frames to use (YYYY-MM-DD)
    #[arg(long)]
    pub bias_date: Option<String>,

    /// Processing engine executable
    #[arg(long)]
    pub engine: Option<String>,
}

impl TargetArgs {
    pub fn load(&self) -> Result<PipelineConfig> {
        let mut config = match self.config {
            Some(ref path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                let config = toml::from_str::<PipelineConfig>(&contents)
                    .context("Invalid pipeline config")?;
                debug!(path = %path.display(), "Loaded pipeline config");
                config
            }
            None => {
                let (Some(target), Some(repo), Some(work)) =
                    (&self.target, &self.repo, &self.work)
                else {
                    bail!("Either --config or all of --target, --repo and --work are required");
                };
                PipelineConfig::new(target.clone(), PathsConfig::new(repo, work))
            }
        };

        if let Some(ref target) = self.target {
            config.target = target.clone();
        }
        if let Some(ref repo) = self.repo {
            config.paths.repo = repo.clone();
        }
        if let Some(ref work) = self.work {
            config.paths.work = work.clone();
        }
        if let Some(ref date) = self.bias_date {
            config.calibration.bias_date = Some(date.clone());
        }
        if let Some(ref program) = self.engine {
            config.engine.program = program.clone();
        }
        debug!(
            object = %config.target,
            repo = %config.paths.repo.display(),
            work = %config.paths.work.display(),
            "Resolved pipeline config"
        );
        Ok(config)
    }
}
