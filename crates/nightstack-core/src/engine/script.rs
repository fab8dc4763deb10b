use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Pixel rejection used when stacking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Rejection {
    /// Engine's default rejection algorithm with low/high sigma bounds.
    Default { low: f32, high: f32 },
    Sigma { low: f32, high: f32 },
    Winsorized { low: f32, high: f32 },
    /// Generalized extreme studentized deviate test.
    Generalized { outliers: f32, significance: f32 },
    /// Plain median, no rejection.
    Median,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default { low, high } => write!(f, "rej {low} {high}"),
            Self::Sigma { low, high } => write!(f, "rej s {low} {high}"),
            Self::Winsorized { low, high } => write!(f, "rej w {low} {high}"),
            Self::Generalized {
                outliers,
                significance,
            } => write!(f, "rej g {outliers} {significance}"),
            Self::Median => write!(f, "med"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    None,
    Additive,
    AdditiveScale,
    Multiplicative,
    MultiplicativeScale,
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "-nonorm"),
            Self::Additive => write!(f, "-norm=add"),
            Self::AdditiveScale => write!(f, "-norm=addscale"),
            Self::Multiplicative => write!(f, "-norm=mul"),
            Self::MultiplicativeScale => write!(f, "-norm=mulscale"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackParams {
    pub rejection: Rejection,
    pub normalization: Normalization,
    /// Normalize the stacked result to [0, 1].
    #[serde(default)]
    pub output_norm: bool,
    /// Write a 32-bit float result.
    #[serde(default)]
    pub float32: bool,
    /// Weighted-FWHM frame filter passed through verbatim (e.g. `3k`).
    #[serde(default)]
    pub filter_wfwhm: Option<String>,
}

impl StackParams {
    /// Rejection stack without normalization, used for biases.
    pub fn bias() -> Self {
        Self {
            rejection: Rejection::Default {
                low: 3.0,
                high: 3.0,
            },
            normalization: Normalization::None,
            output_norm: false,
            float32: false,
            filter_wfwhm: None,
        }
    }

    /// Rejection stack with multiplicative normalization, used for flats.
    pub fn flat() -> Self {
        Self {
            normalization: Normalization::Multiplicative,
            ..Self::bias()
        }
    }

    /// Cross-session light stack.
    pub fn lights() -> Self {
        Self {
            rejection: Rejection::Generalized {
                outliers: 0.3,
                significance: 0.05,
            },
            normalization: Normalization::AdditiveScale,
            output_norm: true,
            float32: true,
            filter_wfwhm: Some("3k".to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Shift,
    Similarity,
    Affine,
    Homography,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    None,
    Nearest,
    Linear,
    Cubic,
    Lanczos4,
    Area,
}

/// Registration options; unset fields leave the engine defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterParams {
    #[serde(default)]
    pub transform: Option<Transform>,
    #[serde(default)]
    pub interpolation: Option<Interpolation>,
}

impl RegisterParams {
    /// Rigid shift without resampling.
    pub fn shift_only() -> Self {
        Self {
            transform: Some(Transform::Shift),
            interpolation: Some(Interpolation::None),
        }
    }
}

/// Channel whose pixel scale the other is resampled to on extraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resample {
    Ha,
    Oiii,
}

/// One engine instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    Requires(String),
    Comment(String),
    /// Turn the images of the working directory into sequence `base`.
    Link {
        base: String,
        out: Option<PathBuf>,
    },
    Cd(PathBuf),
    Calibrate {
        sequence: String,
        bias: Option<PathBuf>,
        flat: Option<PathBuf>,
        /// Treat input as colour-filter-array data and equalize its channels.
        equalize_cfa: bool,
    },
    /// Per-frame background gradient removal with a polynomial of `degree`.
    SubtractSky {
        sequence: String,
        degree: u32,
    },
    /// Split a dual-narrowband sequence into `Ha_` and `OIII_` sequences.
    ExtractHaOiii {
        sequence: String,
        resample: Option<Resample>,
    },
    Register {
        sequence: String,
        params: RegisterParams,
    },
    Stack {
        sequence: String,
        params: StackParams,
        out: PathBuf,
    },
    MirrorX {
        image: PathBuf,
    },
    PixelMath(String),
    UpdateKey {
        key: String,
        value: String,
        comment: String,
    },
    Load(String),
    Save(PathBuf),
}

/// Quote a token for the engine when it contains whitespace.
fn quoted(token: String) -> String {
    if token.chars().any(char::is_whitespace) {
        format!("\"{token}\"")
    } else {
        token
    }
}

fn path_arg(path: &Path) -> String {
    quoted(path.display().to_string())
}

fn option_arg(name: &str, path: &Path) -> String {
    quoted(format!("-{name}={}", path.display()))
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requires(version) => write!(f, "requires {version}"),
            Self::Comment(text) => write!(f, "# {text}"),
            Self::Link { base, out } => {
                write!(f, "link {base}")?;
                if let Some(out) = out {
                    write!(f, " {}", option_arg("out", out))?;
                }
                Ok(())
            }
            Self::Cd(dir) => write!(f, "cd {}", path_arg(dir)),
            Self::Calibrate {
                sequence,
                bias,
                flat,
                equalize_cfa,
            } => {
                write!(f, "calibrate {sequence}")?;
                if let Some(bias) = bias {
                    write!(f, " {}", option_arg("bias", bias))?;
                }
                if let Some(flat) = flat {
                    write!(f, " {}", option_arg("flat", flat))?;
                }
                if *equalize_cfa {
                    write!(f, " -cfa -equalize_cfa")?;
                }
                Ok(())
            }
            Self::SubtractSky { sequence, degree } => write!(f, "seqsubsky {sequence} {degree}"),
            Self::ExtractHaOiii { sequence, resample } => {
                write!(f, "seqextract_HaOIII {sequence}")?;
                match resample {
                    Some(Resample::Ha) => write!(f, " -resample=ha"),
                    Some(Resample::Oiii) => write!(f, " -resample=oiii"),
                    None => Ok(()),
                }
            }
            Self::Register { sequence, params } => {
                write!(f, "register {sequence}")?;
                if let Some(t) = params.transform {
                    let name = match t {
                        Transform::Shift => "shift",
                        Transform::Similarity => "similarity",
                        Transform::Affine => "affine",
                        Transform::Homography => "homography",
                    };
                    write!(f, " -transf={name}")?;
                }
                if let Some(i) = params.interpolation {
                    let name = match i {
                        Interpolation::None => "none",
                        Interpolation::Nearest => "nearest",
                        Interpolation::Linear => "linear",
                        Interpolation::Cubic => "cubic",
                        Interpolation::Lanczos4 => "lanczos4",
                        Interpolation::Area => "area",
                    };
                    write!(f, " -interp={name}")?;
                }
                Ok(())
            }
            Self::Stack {
                sequence,
                params,
                out,
            } => {
                write!(f, "stack {sequence} {}", params.rejection)?;
                if let Some(ref wfwhm) = params.filter_wfwhm {
                    write!(f, " -filter-wfwhm={wfwhm}")?;
                }
                write!(f, " {}", params.normalization)?;
                if params.output_norm {
                    write!(f, " -output_norm")?;
                }
                if params.float32 {
                    write!(f, " -32b")?;
                }
                write!(f, " {}", option_arg("out", out))
            }
            Self::MirrorX { image } => write!(f, "mirrorx_single {}", path_arg(image)),
            Self::PixelMath(expr) => write!(f, "pm \"{expr}\""),
            Self::UpdateKey {
                key,
                value,
                comment,
            } => write!(f, "update_key {key} {value} \"{comment}\""),
            Self::Load(image) => write!(f, "load {}", quoted(image.clone())),
            Self::Save(path) => write!(f, "save \"{}\"", path.display()),
        }
    }
}

/// Ordered list of directives handed to the engine in one invocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Script {
    directives: Vec<Directive>,
}

impl Script {
    /// Empty script starting with a `requires` line when `version` is given.
    pub fn new(requires: Option<&str>) -> Self {
        let mut script = Self::default();
        if let Some(v) = requires {
            script.directives.push(Directive::Requires(v.to_string()));
        }
        script
    }

    pub fn push(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn add(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Engine text, one directive per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for d in &self.directives {
            out.push_str(&d.to_string());
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
