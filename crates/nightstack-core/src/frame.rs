use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::consts::{BIAS_DIR, DARK_DIR, FLAT_DIR, LIGHT_DIR};

static SESSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid session pattern"));

static FILTER_TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}_(?P<filter>[^_]+)_.+\.fits?$")
        .expect("valid filter pattern")
});

static FRAME_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<date>\d{4}-\d{2}-\d{2})_(?P<time>\d{2}-\d{2}-\d{2})_(?P<filter>[^_]+)_(?P<temp>-?\d+(?:\.\d+)?)_(?P<exposure>\d+(?:\.\d+)?)s_(?P<seq>\d+)\.fits?$",
    )
    .expect("valid frame name pattern")
});

/// Kind of raw frame, taken from the directory the file lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    Bias,
    Dark,
    Flat,
    Light,
}

impl FrameType {
    /// Directory name holding frames of this type.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Bias => BIAS_DIR,
            Self::Dark => DARK_DIR,
            Self::Flat => FLAT_DIR,
            Self::Light => LIGHT_DIR,
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A session (or calibration) date in `YYYY-MM-DD` form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Accepts only strict `YYYY-MM-DD` names.
    pub fn parse(s: &str) -> Option<Self> {
        SESSION_PATTERN.is_match(s).then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attributes encoded in a raw frame file name:
/// `DATE_TIME_FILTER_TEMPERATURE_EXPOSUREs_SEQUENCE.fits`.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameName {
    pub date: String,
    pub time: String,
    pub filter_config: String,
    pub temperature: f32,
    pub exposure_secs: f32,
    pub sequence: u32,
}

impl FrameName {
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = FRAME_NAME_PATTERN.captures(file_name)?;
        Some(Self {
            date: caps["date"].to_string(),
            time: caps["time"].to_string(),
            filter_config: caps["filter"].to_string(),
            temperature: caps["temp"].parse().ok()?,
            exposure_secs: caps["exposure"].parse().ok()?,
            sequence: caps["seq"].parse().ok()?,
        })
    }
}

/// Extract just the filter-config token from a frame file name.
///
/// Looser than [`FrameName::parse`]: anything after the filter token is
/// accepted as long as the file has a `.fit`/`.fits` extension.
pub fn filter_token(file_name: &str) -> Option<&str> {
    FILTER_TOKEN_PATTERN
        .captures(file_name)
        .and_then(|caps| caps.name("filter"))
        .map(|m| m.as_str())
}

/// True for `.fit`, `.fits` and other `.fit*` extensions.
pub fn is_fits_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.to_ascii_lowercase().starts_with("fit"))
}

/// A raw frame on disk. Never modified by the pipeline.
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub path: PathBuf,
    pub frame_type: FrameType,
    /// `None` when the file name does not follow the capture convention.
    pub name: Option<FrameName>,
}

impl RawFrame {
    pub fn new(path: PathBuf, frame_type: FrameType) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(FrameName::parse);
        Self {
            path,
            frame_type,
            name,
        }
    }
}

/// Which filter configs contribute to a channel: one label, or `*` for all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterSelector {
    Any,
    Config(String),
}

impl FilterSelector {
    /// Case-insensitive: the engine does not preserve label case.
    pub fn matches(&self, config: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Config(label) => label.eq_ignore_ascii_case(config),
        }
    }

    /// Token used in artifact names; the wildcard renders as `all`.
    pub fn qualifier(&self) -> &str {
        match self {
            Self::Any => "all",
            Self::Config(label) => label,
        }
    }
}

impl From<String> for FilterSelector {
    fn from(s: String) -> Self {
        if s == "*" {
            Self::Any
        } else {
            Self::Config(s)
        }
    }
}

impl From<FilterSelector> for String {
    fn from(sel: FilterSelector) -> Self {
        match sel {
            FilterSelector::Any => "*".to_string(),
            FilterSelector::Config(label) => label,
        }
    }
}

impl fmt::Display for FilterSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Config(label) => f.write_str(label),
        }
    }
}
