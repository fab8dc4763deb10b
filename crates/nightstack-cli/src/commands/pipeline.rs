use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use nightstack_core::engine::create_engine;
use nightstack_core::error::NightstackError;
use nightstack_core::pipeline::{plan_pipeline, run_pipeline_reported, ProgressReporter};
use nightstack_core::stage::{StageKind, StageOutcome};
use tracing::{debug, info};

use super::TargetArgs;

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: TargetArgs,
}

/// Progress bar over the planned stages; prints one line per built stage.
struct BarReporter {
    pb: ProgressBar,
    current: Mutex<String>,
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: StageKind, label: &str) {
        if let Ok(mut current) = self.current.lock() {
            *current = label.to_string();
        }
        self.pb.set_message(format!("{stage}: {label}"));
    }

    fn finish_stage(&self, _stage: StageKind, outcome: StageOutcome) {
        if outcome == StageOutcome::Built {
            if let Ok(current) = self.current.lock() {
                self.pb.println(format!("  built  {current}"));
            }
        }
        self.pb.inc(1);
    }

    fn fail_stage(&self, stage: StageKind, _error: &NightstackError) {
        self.pb.abandon_with_message(format!("{stage} failed"));
    }
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = args.source.load()?;
    let engine = create_engine(&config.engine);
    crate::summary::print_pipeline_summary(&config, engine.name());

    // The plan gives the stage count and surfaces config errors up front.
    let plan = plan_pipeline(&config)?;
    let pending = plan.pending().count();
    info!(stages = plan.stages.len(), pending, "Planned pipeline");
    if pending == 0 {
        println!("All {} stages are up to date.", plan.stages.len());
    }

    let pb = ProgressBar::new(plan.stages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:50} [{bar:30}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let reporter = Arc::new(BarReporter {
        pb: pb.clone(),
        current: Mutex::new(String::new()),
    });

    match run_pipeline_reported(&config, engine, reporter) {
        Ok(report) => {
            pb.finish_with_message("Done");
            crate::summary::print_report(&report);
            Ok(())
        }
        Err(e) => {
            let stage = e.stage().unwrap_or_default();
            debug!(stage = %stage, "Pipeline failed: {e}");
            crate::summary::print_failure(&e);
            Err(e.into())
        }
    }
}
