//! Scanning the raw frame repository.
//!
//! Layout: `{repo}/{target}/{YYYY-MM-DD}/{FLAT|LIGHT|DARK}/DATE_TIME_FILTER_….fits`
//! for target frames and `{masters_raw}/{YYYY-MM-DD}/BIAS/…` for biases.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{NightstackError, Result};
use crate::frame::{filter_token, is_fits_file, FrameType, RawFrame, SessionId};

/// Regular files directly inside `dir`, sorted. A missing directory is empty.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        // Symlinked frames count as files.
        if entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

/// Date-named subdirectories of `dir`, sorted.
fn dated_subdirs(dir: &Path) -> Result<Vec<SessionId>> {
    let mut dates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(id) = entry.file_name().to_str().and_then(SessionId::parse) {
            dates.push(id);
        }
    }
    dates.sort();
    Ok(dates)
}

/// Sessions of a target. A missing target directory yields no sessions.
pub fn find_sessions(repo: &Path, target: &str) -> Result<Vec<SessionId>> {
    let base = repo.join(target);
    if !base.is_dir() {
        warn!(dir = %base.display(), "Target directory not found");
        return Ok(Vec::new());
    }
    let sessions = dated_subdirs(&base)?;
    debug!(object = target, count = sessions.len(), "Found sessions");
    Ok(sessions)
}

/// Filter configs used in a session, read from its FLAT file names.
pub fn find_filter_configs(
    repo: &Path,
    target: &str,
    session: &SessionId,
) -> Result<BTreeSet<String>> {
    let flat_dir = repo
        .join(target)
        .join(session.as_str())
        .join(FrameType::Flat.dir_name());
    if !flat_dir.is_dir() {
        warn!(
            session = %session,
            dir = %flat_dir.display(),
            "FLAT directory not found"
        );
        return Ok(BTreeSet::new());
    }

    let configs: BTreeSet<String> = list_files(&flat_dir)?
        .iter()
        .filter_map(|p| filter_token(file_name(p)))
        .map(str::to_string)
        .collect();
    info!(session = %session, configs = ?configs, "Found filter configs");
    Ok(configs)
}

/// Raw frames of one type for a (session, config) pair.
///
/// Fails with [`NightstackError::NotFound`] when nothing matches: no stage can
/// run without at least one frame.
pub fn find_frames(
    repo: &Path,
    target: &str,
    session: &SessionId,
    config: &str,
    frame_type: FrameType,
) -> Result<Vec<PathBuf>> {
    let dir = repo
        .join(target)
        .join(session.as_str())
        .join(frame_type.dir_name());
    let needle = format!("_{config}_");
    let frames: Vec<PathBuf> = list_files(&dir)?
        .into_iter()
        .filter(|p| is_fits_file(p) && file_name(p).contains(&needle))
        .collect();

    if frames.is_empty() {
        return Err(NightstackError::NotFound {
            frame_type,
            session: session.to_string(),
            config: config.to_string(),
            dir,
        });
    }
    debug!(
        frame_type = %frame_type,
        session = %session,
        config,
        count = frames.len(),
        "Found frames"
    );
    Ok(frames)
}

/// Bias frames captured on `date`.
pub fn find_bias_frames(masters_raw: &Path, date: &SessionId) -> Result<Vec<PathBuf>> {
    let dir = masters_raw
        .join(date.as_str())
        .join(FrameType::Bias.dir_name());
    let prefix = format!("{date}_");
    let frames: Vec<PathBuf> = list_files(&dir)?
        .into_iter()
        .filter(|p| is_fits_file(p) && file_name(p).starts_with(&prefix))
        .collect();

    if frames.is_empty() {
        return Err(NightstackError::NotFound {
            frame_type: FrameType::Bias,
            session: date.to_string(),
            config: "*".to_string(),
            dir,
        });
    }
    Ok(frames)
}

/// Most recent calibration date that holds at least one bias frame.
pub fn latest_bias_date(masters_raw: &Path) -> Result<Option<SessionId>> {
    if !masters_raw.is_dir() {
        warn!(dir = %masters_raw.display(), "Calibration directory not found");
        return Ok(None);
    }
    for date in dated_subdirs(masters_raw)?.into_iter().rev() {
        match find_bias_frames(masters_raw, &date) {
            Ok(_) => return Ok(Some(date)),
            Err(NightstackError::NotFound { .. }) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Frame counts for one filter config of a session.
#[derive(Clone, Debug, Default)]
pub struct ConfigInventory {
    pub config: String,
    pub flats: usize,
    pub lights: usize,
    /// Sum of the exposure times parsed from the LIGHT file names.
    pub light_integration_secs: f64,
}

#[derive(Clone, Debug)]
pub struct SessionInventory {
    pub session: SessionId,
    pub configs: Vec<ConfigInventory>,
}

/// Everything discovery can tell about a target without running anything.
#[derive(Clone, Debug)]
pub struct TargetInventory {
    pub target: String,
    pub sessions: Vec<SessionInventory>,
}

impl TargetInventory {
    pub fn total_lights(&self) -> usize {
        self.sessions
            .iter()
            .flat_map(|s| &s.configs)
            .map(|c| c.lights)
            .sum()
    }

    pub fn total_integration_secs(&self) -> f64 {
        self.sessions
            .iter()
            .flat_map(|s| &s.configs)
            .map(|c| c.light_integration_secs)
            .sum()
    }
}

/// Walk a target's sessions and configs and count their frames.
///
/// Unlike [`find_frames`], a config with no frames of a type is reported with
/// a zero count instead of failing.
pub fn inventory(repo: &Path, target: &str) -> Result<TargetInventory> {
    let mut sessions = Vec::new();
    for session in find_sessions(repo, target)? {
        let mut configs = Vec::new();
        for config in find_filter_configs(repo, target, &session)? {
            let flats = count_or_zero(find_frames(repo, target, &session, &config, FrameType::Flat))?;
            let lights = match find_frames(repo, target, &session, &config, FrameType::Light) {
                Ok(paths) => paths,
                Err(NightstackError::NotFound { .. }) => Vec::new(),
                Err(e) => return Err(e),
            };
            let light_integration_secs = lights
                .iter()
                .map(|p| RawFrame::new(p.clone(), FrameType::Light))
                .filter_map(|f| f.name)
                .map(|n| n.exposure_secs as f64)
                .sum();
            configs.push(ConfigInventory {
                config,
                flats,
                lights: lights.len(),
                light_integration_secs,
            });
        }
        sessions.push(SessionInventory { session, configs });
    }
    Ok(TargetInventory {
        target: target.to_string(),
        sessions,
    })
}

fn count_or_zero(found: Result<Vec<PathBuf>>) -> Result<usize> {
    match found {
        Ok(paths) => Ok(paths.len()),
        Err(NightstackError::NotFound { .. }) => Ok(0),
        Err(e) => Err(e),
    }
}
