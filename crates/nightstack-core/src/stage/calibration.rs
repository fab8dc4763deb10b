use std::path::Path;

use tracing::debug;

use crate::cache::{remove_sequence, Artifact};
use crate::consts::HA_OIII_VARIANTS;
use crate::discovery::{find_bias_frames, find_frames};
use crate::engine::script::Directive;
use crate::error::{NightstackError, Result};
use crate::frame::{FrameType, SessionId};
use crate::naming;
use crate::pipeline::config::PipelineConfig;

use super::{Job, StageInput, StageKind, StageResult, StageRunner};

/// One calibrated sequence produced for a (session, config) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSequence {
    /// Extracted variant (`Ha`, `OIII`), `None` for an unsplit sequence.
    pub variant: Option<String>,
    /// Sequence base name in the process directory.
    pub base: String,
}

/// The calibrated-light artifacts of one (session, config) pair.
#[derive(Clone, Debug)]
pub struct CalibratedLights {
    pub session: SessionId,
    pub config: String,
    pub sequences: Vec<ChannelSequence>,
}

fn require(stage: &str, path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(NightstackError::MissingInput {
            stage: stage.to_string(),
            what: format!("{what} {}", path.display()),
        })
    }
}

fn inputs(frames: Vec<std::path::PathBuf>) -> Vec<StageInput> {
    frames.into_iter().map(StageInput::from_path).collect()
}

/// Remove every sequence an earlier calibrated-light build of (session,
/// filter) left in the process directory, so a rebuild with fewer frames
/// cannot leave old numbered frames behind for the channel stacks.
fn clear_light_sequences(process: &Path, session: &SessionId, filter: &str) -> Result<()> {
    let linked = naming::light_base(session, filter);
    let calibrated = naming::calibrated(&linked);
    let background = naming::background_removed(&calibrated);
    let mut bases = vec![linked, calibrated, background.clone()];
    bases.extend(HA_OIII_VARIANTS.iter().map(|v| naming::extracted(v, &background)));

    let mut removed = 0;
    for base in &bases {
        removed += remove_sequence(process, base)?;
    }
    if removed > 0 {
        debug!(session = %session, config = filter, removed, "Cleared previous light sequences");
    }
    Ok(())
}

pub fn bias_outputs(config: &PipelineConfig, date: &SessionId) -> Vec<Artifact> {
    let masters = config.paths.masters_dir();
    vec![Artifact::File(naming::master_bias_path(&masters, date))]
}

pub fn flat_outputs(config: &PipelineConfig, session: &SessionId, filter: &str) -> Vec<Artifact> {
    let process = config.paths.process_dir();
    vec![Artifact::File(naming::master_flat_path(&process, session, filter))]
}

/// Sequences the calibrated-light stage leaves for (session, filter).
pub fn calibrated_sequences(
    config: &PipelineConfig,
    session: &SessionId,
    filter: &str,
) -> CalibratedLights {
    let sequences = match config.lights.extraction {
        Some(ref extraction) if extraction.applies_to(filter) => extraction
            .variants()
            .iter()
            .map(|v| ChannelSequence {
                variant: Some(v.to_string()),
                base: naming::calibrated_light_base(session, filter, Some(v)),
            })
            .collect(),
        _ => vec![ChannelSequence {
            variant: None,
            base: naming::calibrated_light_base(session, filter, None),
        }],
    };
    CalibratedLights {
        session: session.clone(),
        config: filter.to_string(),
        sequences,
    }
}

pub fn light_outputs(config: &PipelineConfig, session: &SessionId, filter: &str) -> Vec<Artifact> {
    let process = config.paths.process_dir();
    calibrated_sequences(config, session, filter)
        .sequences
        .into_iter()
        .map(|s| Artifact::sequence(process.clone(), s.base))
        .collect()
}

impl StageRunner<'_> {
    /// Master bias of one calibration date: rejection stack, no normalization.
    pub fn master_bias(&self, date: &SessionId) -> Result<StageResult> {
        let outputs = bias_outputs(self.config, date);
        let output = naming::master_bias_path(&self.config.paths.masters_dir(), date);

        self.resolve(
            StageKind::MasterBias,
            format!("master bias {date}"),
            outputs,
            false,
            || {
                let frames = find_bias_frames(&self.config.paths.masters_raw_dir(), date)?;
                let script = self
                    .script()
                    .push(Directive::Link {
                        base: "bias".into(),
                        out: None,
                    })
                    .push(Directive::Stack {
                        sequence: "bias".into(),
                        params: self.config.calibration.bias_stack.clone(),
                        out: output.clone(),
                    });
                Ok(Job {
                    inputs: inputs(frames),
                    script,
                })
            },
        )
    }

    /// Master flat of one (session, config): bias-calibrated, then stacked
    /// with multiplicative normalization.
    pub fn master_flat(&self, session: &SessionId, config: &str, bias: &Path) -> Result<StageResult> {
        let label = format!("master flat {session}/{config}");
        let output = naming::master_flat_path(&self.config.paths.process_dir(), session, config);
        let base = naming::flat_base(session, config);

        self.resolve(
            StageKind::MasterFlat,
            label.clone(),
            flat_outputs(self.config, session, config),
            false,
            || {
                require(&label, bias, "master bias")?;
                let frames = find_frames(
                    &self.config.paths.repo,
                    &self.config.target,
                    session,
                    config,
                    FrameType::Flat,
                )?;
                let script = self
                    .script()
                    .push(Directive::Link {
                        base: base.clone(),
                        out: None,
                    })
                    .push(Directive::Calibrate {
                        sequence: base.clone(),
                        bias: Some(naming::strip_extension(bias)),
                        flat: None,
                        equalize_cfa: false,
                    })
                    .push(Directive::Stack {
                        sequence: naming::calibrated(&base),
                        params: self.config.calibration.flat_stack.clone(),
                        out: output.clone(),
                    });
                Ok(Job {
                    inputs: inputs(frames),
                    script,
                })
            },
        )
    }

    /// Calibrate, background-correct and (for dual-band configs) split the
    /// lights of one (session, config). The sequences land in the process
    /// directory, where the channel stacks pick them up.
    pub fn calibrated_lights(
        &self,
        session: &SessionId,
        config: &str,
        bias: &Path,
        flat: &Path,
        force: bool,
    ) -> Result<StageResult> {
        let label = format!("calibrated lights {session}/{config}");
        let process = self.config.paths.process_dir();
        let base = naming::light_base(session, config);
        let extraction = self
            .config
            .lights
            .extraction
            .as_ref()
            .filter(|e| e.applies_to(config));

        self.resolve(
            StageKind::CalibratedLights,
            label.clone(),
            light_outputs(self.config, session, config),
            force,
            || {
                require(&label, bias, "master bias")?;
                require(&label, flat, "master flat")?;
                let frames = find_frames(
                    &self.config.paths.repo,
                    &self.config.target,
                    session,
                    config,
                    FrameType::Light,
                )?;

                clear_light_sequences(&process, session, config)?;

                let calibrated = naming::calibrated(&base);
                let mut script = self
                    .script()
                    .push(Directive::Link {
                        base: base.clone(),
                        out: Some(process.clone()),
                    })
                    .push(Directive::Cd(process.clone()))
                    .push(Directive::Calibrate {
                        sequence: base.clone(),
                        bias: Some(naming::strip_extension(bias)),
                        flat: Some(naming::strip_extension(flat)),
                        equalize_cfa: self.config.calibration.equalize_cfa,
                    })
                    .push(Directive::SubtractSky {
                        sequence: calibrated.clone(),
                        degree: self.config.lights.background_degree,
                    });
                if let Some(extraction) = extraction {
                    script.add(Directive::ExtractHaOiii {
                        sequence: naming::background_removed(&calibrated),
                        resample: extraction.resample,
                    });
                }
                Ok(Job {
                    inputs: inputs(frames),
                    script,
                })
            },
        )
    }
}
