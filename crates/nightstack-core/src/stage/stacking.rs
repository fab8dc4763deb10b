use std::path::{Path, PathBuf};

use tracing::info;

use crate::cache::{sequence_frames, Artifact};
use crate::consts::RENORMALIZE_SEQUENCE;
use crate::engine::script::Directive;
use crate::engine::Script;
use crate::error::{NightstackError, Result};
use crate::naming;
use crate::pipeline::config::{ChannelConfig, PipelineConfig, RenormalizeConfig};

use super::{CalibratedLights, Job, StageInput, StageKind, StageResult, StageRunner};

pub fn stack_path(config: &PipelineConfig, channel: &ChannelConfig) -> PathBuf {
    naming::channel_stack_path(&config.paths.process_dir(), &channel.name, &channel.filter)
}

/// One deliverable per configured channel.
pub fn renormalize_outputs(config: &PipelineConfig) -> Vec<Artifact> {
    let deliverables = config.paths.deliverables_dir();
    config
        .channels
        .iter()
        .map(|c| Artifact::File(naming::deliverable_path(&deliverables, &config.target, &c.name)))
        .collect()
}

impl StageRunner<'_> {
    /// Frames of every calibrated sequence feeding `channel`, gathered across
    /// all sessions and configs.
    pub fn channel_inputs(
        &self,
        channel: &ChannelConfig,
        calibrated: &[CalibratedLights],
    ) -> Result<Vec<PathBuf>> {
        let label = format!("stack {}", channel.name);
        let process = self.config.paths.process_dir();

        let mut frames = Vec::new();
        let mut contributing = 0;
        for lights in calibrated {
            for seq in &lights.sequences {
                if !channel.accepts(&lights.config, seq.variant.as_deref()) {
                    continue;
                }
                contributing += 1;
                let found = sequence_frames(&process, &seq.base)?;
                if found.is_empty() {
                    return Err(NightstackError::MissingInput {
                        stage: label,
                        what: format!("frames of sequence {} in {}", seq.base, process.display()),
                    });
                }
                frames.extend(found);
            }
        }

        if contributing == 0 {
            return Err(NightstackError::MissingInput {
                stage: label,
                what: format!("no calibrated sequence matches {channel}"),
            });
        }
        Ok(frames)
    }

    /// Merge, register and stack all sessions' frames of one channel, then
    /// mirror the result to the canonical handedness.
    pub fn channel_stack(
        &self,
        channel: &ChannelConfig,
        calibrated: &[CalibratedLights],
    ) -> Result<StageResult> {
        let output = stack_path(self.config, channel);
        let merged = naming::merged_base(channel.variant.as_deref());
        let stacking = &self.config.stacking;

        self.resolve(
            StageKind::ChannelStack,
            format!("stack {}", channel.name),
            vec![Artifact::File(output.clone())],
            false,
            || {
                let frames = self.channel_inputs(channel, calibrated)?;
                info!(channel = %channel, frames = frames.len(), "Merging sessions");

                let mut script = self
                    .script()
                    .push(Directive::Link {
                        base: merged.clone(),
                        out: None,
                    })
                    .push(Directive::Register {
                        sequence: merged.clone(),
                        params: stacking.register.clone(),
                    })
                    .push(Directive::Stack {
                        sequence: naming::registered(&merged),
                        params: stacking.params.clone(),
                        out: output.clone(),
                    });
                if stacking.mirror_x {
                    script.add(Directive::MirrorX {
                        image: output.clone(),
                    });
                }
                Ok(Job {
                    inputs: frames.into_iter().map(StageInput::from_path).collect(),
                    script,
                })
            },
        )
    }

    /// Register all channel stacks to each other and rescale every
    /// non-reference channel to the reference's median and spread.
    ///
    /// `stacks` is parallel to the configured channels.
    pub fn renormalize(&self, stacks: &[PathBuf]) -> Result<StageResult> {
        let label = "renormalize".to_string();
        let channels = &self.config.channels;
        let settings = &self.config.renormalize;
        let deliverables = self.config.paths.deliverables_dir();

        self.resolve(
            StageKind::Renormalize,
            label.clone(),
            renormalize_outputs(self.config),
            false,
            || {
                let reference = self.config.reference_channel().ok_or_else(|| {
                    NightstackError::ConfigurationMissing(format!(
                        "renormalize.reference `{}` is not a configured channel",
                        settings.reference
                    ))
                })?;
                if stacks.len() != channels.len() {
                    return Err(NightstackError::MissingInput {
                        stage: label.clone(),
                        what: format!("{} stacks for {} channels", stacks.len(), channels.len()),
                    });
                }

                // Link names sort in channel order, so frame i+1 of the
                // sequence is channel i.
                let mut inputs = Vec::with_capacity(stacks.len());
                for (i, (stack, channel)) in stacks.iter().zip(channels).enumerate() {
                    if !stack.is_file() {
                        return Err(NightstackError::MissingInput {
                            stage: label.clone(),
                            what: format!("stack {}", stack.display()),
                        });
                    }
                    let ext = stack.extension().and_then(|e| e.to_str()).unwrap_or("fit");
                    inputs.push(StageInput::renamed(
                        stack.clone(),
                        format!("{:02}_{}.{ext}", i + 1, channel.name),
                    ));
                }

                let registered = naming::registered(RENORMALIZE_SEQUENCE);
                let frame = |i: usize| naming::sequence_frame_stem(&registered, i + 1);
                let reference_frame = frame(reference);

                let mut script = self
                    .script()
                    .push(Directive::Link {
                        base: RENORMALIZE_SEQUENCE.into(),
                        out: None,
                    })
                    .push(Directive::Register {
                        sequence: RENORMALIZE_SEQUENCE.into(),
                        params: settings.register.clone(),
                    });
                for (i, channel) in channels.iter().enumerate() {
                    if i == reference {
                        continue;
                    }
                    script.add(Directive::PixelMath(
                        settings.formula_for(&frame(i), &reference_frame),
                    ));
                    push_save(&mut script, channel, &deliverables, &self.config.target, settings);
                }
                script.add(Directive::Load(reference_frame.clone()));
                push_save(
                    &mut script,
                    &channels[reference],
                    &deliverables,
                    &self.config.target,
                    settings,
                );

                Ok(Job { inputs, script })
            },
        )
    }
}

fn push_save(
    script: &mut Script,
    channel: &ChannelConfig,
    deliverables: &Path,
    target: &str,
    settings: &RenormalizeConfig,
) {
    script.add(Directive::UpdateKey {
        key: "FILTER".into(),
        value: channel.name.clone(),
        comment: settings.filter_comment.clone(),
    });
    script.add(Directive::Save(naming::deliverable_path(
        deliverables,
        target,
        &channel.name,
    )));
}
