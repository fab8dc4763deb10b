use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_BACKGROUND_DEGREE, DEFAULT_FILTER_COMMENT, DEFAULT_RENORMALIZE_FORMULA,
    HA_OIII_VARIANTS,
};
use crate::engine::script::{RegisterParams, Resample, StackParams};
use crate::engine::EngineConfig;
use crate::error::{NightstackError, Result};
use crate::frame::{FilterSelector, SessionId};

/// Everything one pipeline run needs: where frames live, where artifacts go,
/// and the recipe parameters handed to the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Target name as it appears in the repository (`NGC 281`).
    pub target: String,
    pub paths: PathsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub lights: LightsConfig,
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub stacking: ChannelStackConfig,
    #[serde(default)]
    pub renormalize: RenormalizeConfig,
}

impl PipelineConfig {
    /// Default recipe for `target`.
    pub fn new(target: impl Into<String>, paths: PathsConfig) -> Self {
        Self {
            target: target.into(),
            paths,
            engine: EngineConfig::default(),
            calibration: CalibrationConfig::default(),
            lights: LightsConfig::default(),
            channels: default_channels(),
            stacking: ChannelStackConfig::default(),
            renormalize: RenormalizeConfig::default(),
        }
    }

    /// Check that every parameter the stages need is present and consistent.
    /// Runs before any engine invocation.
    pub fn validate(&self) -> Result<()> {
        let missing = |msg: String| Err(NightstackError::ConfigurationMissing(msg));

        if self.target.trim().is_empty() {
            return missing("target name is empty".into());
        }
        if self.channels.is_empty() {
            return missing("no output channels configured".into());
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.name.trim().is_empty() {
                return missing("channel with an empty name".into());
            }
            if !seen.insert(channel.name.to_ascii_lowercase()) {
                return missing(format!("channel `{}` is configured twice", channel.name));
            }
            if let Some(ref variant) = channel.variant {
                let Some(ref extraction) = self.lights.extraction else {
                    return missing(format!(
                        "channel `{}` needs variant `{variant}` but lights.extraction is not configured",
                        channel.name
                    ));
                };
                if !extraction.produces(variant) {
                    return missing(format!(
                        "channel `{}`: extraction does not produce variant `{variant}`",
                        channel.name
                    ));
                }
            }
            self.check_channel_source(channel)?;
        }

        if self.reference_channel().is_none() {
            return missing(format!(
                "renormalize.reference `{}` is not one of the configured channels",
                self.renormalize.reference
            ));
        }
        for placeholder in ["{image}", "{reference}"] {
            if !self.renormalize.formula.contains(placeholder) {
                return missing(format!("renormalize.formula lacks the {placeholder} placeholder"));
            }
        }

        if let Some(ref date) = self.calibration.bias_date {
            if SessionId::parse(date).is_none() {
                return missing(format!("calibration.bias_date `{date}` is not YYYY-MM-DD"));
            }
        }
        Ok(())
    }

    /// A channel must be able to receive at least one calibrated sequence:
    /// variant channels need their config split, whole-sequence channels
    /// need it kept whole.
    fn check_channel_source(&self, channel: &ChannelConfig) -> Result<()> {
        let extraction = self.lights.extraction.as_ref();
        let unsatisfiable = match (&channel.filter, &channel.variant) {
            (FilterSelector::Config(label), Some(_)) => {
                !extraction.is_some_and(|e| e.applies_to(label))
            }
            (FilterSelector::Config(label), None) => extraction.is_some_and(|e| e.applies_to(label)),
            (FilterSelector::Any, None) => extraction.is_some_and(|e| e.configs.is_empty()),
            (FilterSelector::Any, Some(_)) => false,
        };
        if !unsatisfiable {
            return Ok(());
        }
        let reason = match channel.variant {
            Some(_) => "lights.extraction does not split",
            None => "lights.extraction splits every sequence of",
        };
        Err(NightstackError::ConfigurationMissing(format!(
            "channel `{}` can never be stacked: {reason} `{}`",
            channel.name, channel.filter
        )))
    }

    /// Index of the renormalization reference in `channels`.
    pub fn reference_channel(&self) -> Option<usize> {
        self.channels
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&self.renormalize.reference))
    }
}

/// Directory layout. Only `repo` and `work` are required; the rest default
/// to locations under them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the raw frames: `{repo}/{target}/{session}/{FRAMETYPE}/`.
    pub repo: PathBuf,
    /// Root of everything the pipeline writes.
    pub work: PathBuf,
    /// Bias frames by date. Default: `{repo}/masters-raw`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masters_raw: Option<PathBuf>,
    /// Master biases. Default: `{work}/masters`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masters: Option<PathBuf>,
    /// Flat working tree of per-session and per-channel artifacts.
    /// Default: `{work}/process`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<PathBuf>,
    /// Final renormalized images, one directory per target.
    /// Default: `{work}/targets`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverables: Option<PathBuf>,
    /// Where scratch directories are created. Default: the system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch: Option<PathBuf>,
}

impl PathsConfig {
    pub fn new(repo: impl Into<PathBuf>, work: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            work: work.into(),
            masters_raw: None,
            masters: None,
            process: None,
            deliverables: None,
            scratch: None,
        }
    }

    pub fn masters_raw_dir(&self) -> PathBuf {
        self.masters_raw
            .clone()
            .unwrap_or_else(|| self.repo.join("masters-raw"))
    }

    pub fn masters_dir(&self) -> PathBuf {
        self.masters.clone().unwrap_or_else(|| self.work.join("masters"))
    }

    pub fn process_dir(&self) -> PathBuf {
        self.process.clone().unwrap_or_else(|| self.work.join("process"))
    }

    pub fn deliverables_dir(&self) -> PathBuf {
        self.deliverables
            .clone()
            .unwrap_or_else(|| self.work.join("targets"))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Date whose bias frames build the master bias. When unset, the most
    /// recent date with bias frames is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias_date: Option<String>,
    pub bias_stack: StackParams,
    pub flat_stack: StackParams,
    /// Equalize colour-filter-array channels while calibrating lights.
    pub equalize_cfa: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            bias_date: None,
            bias_stack: StackParams::bias(),
            flat_stack: StackParams::flat(),
            equalize_cfa: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    /// Polynomial degree of the per-frame background removal.
    pub background_degree: u32,
    /// Dual-narrowband channel extraction; `None` keeps sequences whole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionConfig>,
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self {
            background_degree: DEFAULT_BACKGROUND_DEGREE,
            extraction: Some(ExtractionConfig::default()),
        }
    }
}

/// Ha/OIII extraction from a dual-narrowband filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Channel whose pixel scale the other is resampled to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resample: Option<Resample>,
    /// Filter configs to extract. Empty means every config.
    #[serde(default)]
    pub configs: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            resample: Some(Resample::Ha),
            configs: Vec::new(),
        }
    }
}

impl ExtractionConfig {
    pub fn applies_to(&self, config: &str) -> bool {
        self.configs.is_empty() || self.configs.iter().any(|c| c.eq_ignore_ascii_case(config))
    }

    /// Variant names as the engine writes them.
    pub fn variants(&self) -> &'static [&'static str] {
        &HA_OIII_VARIANTS
    }

    pub fn produces(&self, variant: &str) -> bool {
        self.variants().iter().any(|v| v.eq_ignore_ascii_case(variant))
    }
}

/// One logical output channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Name used for the stack and the deliverable (`stacked_{name}.fits`).
    pub name: String,
    /// Filter configs whose sequences feed this channel; `*` for all.
    pub filter: FilterSelector,
    /// Extracted variant to take from those configs; `None` for
    /// non-extracted sequences. Compared ignoring ASCII case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl ChannelConfig {
    pub fn new(name: &str, filter: &str, variant: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            filter: FilterSelector::from(filter.to_string()),
            variant: variant.map(str::to_string),
        }
    }

    /// Does the sequence of (`config`, `variant`) contribute to this channel?
    pub fn accepts(&self, config: &str, variant: Option<&str>) -> bool {
        let variant_ok = match (self.variant.as_deref(), variant) {
            (Some(want), Some(have)) => want.eq_ignore_ascii_case(have),
            (None, None) => true,
            _ => false,
        };
        variant_ok && self.filter.matches(config)
    }
}

impl fmt::Display for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            Some(ref v) => write!(f, "{} ({} \u{2192} {})", self.name, self.filter, v),
            None => write!(f, "{} ({})", self.name, self.filter),
        }
    }
}

/// Sii from the SiiOiii filter's red channel (the engine calls it Ha), Ha
/// from the HaOiii filter, OIII from both filters.
pub fn default_channels() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig::new("Sii", "SiiOiii", Some("Ha")),
        ChannelConfig::new("Ha", "HaOiii", Some("Ha")),
        ChannelConfig::new("OIII", "*", Some("OIII")),
    ]
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelStackConfig {
    pub params: StackParams,
    #[serde(default)]
    pub register: RegisterParams,
    /// Mirror the stack horizontally to the canonical handedness.
    pub mirror_x: bool,
}

impl Default for ChannelStackConfig {
    fn default() -> Self {
        Self {
            params: StackParams::lights(),
            register: RegisterParams::default(),
            mirror_x: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RenormalizeConfig {
    /// Channel whose median and spread the others are matched to.
    pub reference: String,
    pub register: RegisterParams,
    /// Pixel math template; `{image}` and `{reference}` are replaced by the
    /// registered image names.
    pub formula: String,
    /// Comment stored with the FILTER keyword of each output.
    pub filter_comment: String,
}

impl Default for RenormalizeConfig {
    fn default() -> Self {
        Self {
            reference: "Ha".to_string(),
            register: RegisterParams::shift_only(),
            formula: DEFAULT_RENORMALIZE_FORMULA.to_string(),
            filter_comment: DEFAULT_FILTER_COMMENT.to_string(),
        }
    }
}

impl RenormalizeConfig {
    /// Formula with both placeholders filled in.
    pub fn formula_for(&self, image: &str, reference: &str) -> String {
        self.formula
            .replace("{image}", image)
            .replace("{reference}", reference)
    }
}
