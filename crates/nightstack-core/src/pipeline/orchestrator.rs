use std::sync::Arc;

use tracing::{info, warn};

use crate::discovery::{find_filter_configs, find_sessions, latest_bias_date};
use crate::engine::ProcessingEngine;
use crate::error::{NightstackError, Result};
use crate::frame::SessionId;
use crate::naming;
use crate::stage::{calibrated_sequences, stack_path, StageOutcome, StageRunner};

use super::config::PipelineConfig;
use super::types::{NoOpReporter, PipelineReport, ProgressReporter};

/// The calibration date whose bias frames feed every session: the configured
/// one, else the newest date under the raw masters directory.
pub fn resolve_bias_date(config: &PipelineConfig) -> Result<SessionId> {
    if let Some(ref date) = config.calibration.bias_date {
        return SessionId::parse(date).ok_or_else(|| {
            NightstackError::ConfigurationMissing(format!(
                "calibration.bias_date `{date}` is not a YYYY-MM-DD date"
            ))
        });
    }

    let masters_raw = config.paths.masters_raw_dir();
    match latest_bias_date(&masters_raw)? {
        Some(date) => {
            info!(date = %date, "Using latest bias date");
            Ok(date)
        }
        None => Err(NightstackError::ConfigurationMissing(format!(
            "calibration.bias_date is unset and {} holds no dated bias directory",
            masters_raw.display()
        ))),
    }
}

/// Run the full reduction with a thread-safe progress reporter.
///
/// Stages resolve strictly in dependency order and the first failure aborts
/// the run. Artifacts written before the failure stay on disk, so the next
/// run resumes from them.
///
/// A present artifact is reused even when something upstream was rebuilt in
/// the same run, with one exception: a master flat built in this run forces
/// the calibrated lights of its (session, config) to rebuild. A rebuilt bias
/// does not touch existing flats, and rebuilt lights do not touch existing
/// stacks or deliverables; delete those to refresh them.
pub fn run_pipeline_reported(
    config: &PipelineConfig,
    engine: Arc<dyn ProcessingEngine>,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<PipelineReport> {
    config.validate()?;
    info!(
        object = %config.target,
        engine = engine.name(),
        "Starting pipeline"
    );

    let paths = &config.paths;
    let runner = StageRunner::new(config, engine, reporter);
    let mut report = PipelineReport::new(&config.target);

    let date = resolve_bias_date(config)?;
    let bias = naming::master_bias_path(&paths.masters_dir(), &date);
    report.stages.push(runner.master_bias(&date)?);

    let sessions = find_sessions(&paths.repo, &config.target)?;
    if sessions.is_empty() {
        warn!(object = %config.target, "No sessions found");
    }

    let mut calibrated = Vec::new();
    for session in &sessions {
        for filter in find_filter_configs(&paths.repo, &config.target, session)? {
            let flat = naming::master_flat_path(&paths.process_dir(), session, &filter);
            let flat_stage = runner.master_flat(session, &filter, &bias)?;
            // Lights calibrated against an older flat are stale.
            let rebuild = flat_stage.outcome == StageOutcome::Built;
            report.stages.push(flat_stage);

            report
                .stages
                .push(runner.calibrated_lights(session, &filter, &bias, &flat, rebuild)?);
            calibrated.push(calibrated_sequences(config, session, &filter));
        }
    }
    info!(
        sessions = sessions.len(),
        configs = calibrated.len(),
        "Calibration complete"
    );

    let mut stacks = Vec::with_capacity(config.channels.len());
    for channel in &config.channels {
        report.stages.push(runner.channel_stack(channel, &calibrated)?);
        stacks.push(stack_path(config, channel));
    }

    report.stages.push(runner.renormalize(&stacks)?);

    info!(
        built = report.built_count(),
        cached = report.cached_count(),
        "Pipeline complete"
    );
    Ok(report)
}

/// Run the full reduction without progress reporting.
pub fn run_pipeline(
    config: &PipelineConfig,
    engine: Arc<dyn ProcessingEngine>,
) -> Result<PipelineReport> {
    let reporter = Arc::new(NoOpReporter);
    run_pipeline_reported(config, engine, reporter)
}
