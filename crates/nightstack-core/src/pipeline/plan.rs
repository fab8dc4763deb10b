use crate::cache::{all_exist, Artifact};
use crate::discovery::{find_filter_configs, find_sessions};
use crate::error::Result;
use crate::stage::{
    bias_outputs, flat_outputs, light_outputs, renormalize_outputs, stack_path, StageKind,
};

use super::config::PipelineConfig;
use super::orchestrator::resolve_bias_date;
use super::types::{PipelinePlan, PlannedStage};

fn planned(kind: StageKind, label: String, outputs: Vec<Artifact>, forced: bool) -> PlannedStage {
    PlannedStage {
        kind,
        label,
        cached: !forced && all_exist(&outputs),
        outputs: outputs.iter().map(Artifact::path).collect(),
    }
}

/// Walk the same stage graph as a run, checking only the cache.
///
/// A pending flat marks its calibrated lights pending too, matching the
/// rebuild a run would do. Stacks and the renormalize step are judged by
/// their own outputs alone.
pub fn plan_pipeline(config: &PipelineConfig) -> Result<PipelinePlan> {
    config.validate()?;
    let paths = &config.paths;
    let mut stages = Vec::new();

    let date = resolve_bias_date(config)?;
    stages.push(planned(
        StageKind::MasterBias,
        format!("master bias {date}"),
        bias_outputs(config, &date),
        false,
    ));

    for session in find_sessions(&paths.repo, &config.target)? {
        for filter in find_filter_configs(&paths.repo, &config.target, &session)? {
            let flat = planned(
                StageKind::MasterFlat,
                format!("master flat {session}/{filter}"),
                flat_outputs(config, &session, &filter),
                false,
            );
            let rebuild = !flat.cached;
            stages.push(flat);
            stages.push(planned(
                StageKind::CalibratedLights,
                format!("calibrated lights {session}/{filter}"),
                light_outputs(config, &session, &filter),
                rebuild,
            ));
        }
    }

    for channel in &config.channels {
        stages.push(planned(
            StageKind::ChannelStack,
            format!("stack {}", channel.name),
            vec![Artifact::File(stack_path(config, channel))],
            false,
        ));
    }

    stages.push(planned(
        StageKind::Renormalize,
        "renormalize".into(),
        renormalize_outputs(config),
        false,
    ));

    Ok(PipelinePlan {
        target: config.target.clone(),
        stages,
    })
}
