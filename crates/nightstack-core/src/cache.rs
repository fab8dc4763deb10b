//! Existence checks that decide skip-vs-build for every stage.
//!
//! A file at its canonical path is the only completion record. Contents are
//! never inspected: a truncated file still counts as done and has to be
//! deleted by hand to force a rebuild.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::SEQUENCE_FILE_SUFFIX;
use crate::error::Result;
use crate::frame::is_fits_file;

/// Something a stage is expected to leave on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Artifact {
    /// A single image at a known path.
    File(PathBuf),
    /// An engine sequence, present when `{dir}/{base}_.seq` exists. The file
    /// name is compared ignoring ASCII case since the engine picks its own
    /// casing for channel prefixes.
    Sequence { dir: PathBuf, base: String },
}

impl Artifact {
    pub fn sequence(dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self::Sequence {
            dir: dir.into(),
            base: base.into(),
        }
    }

    pub fn exists(&self) -> bool {
        match self {
            Self::File(path) => path.is_file(),
            Self::Sequence { dir, base } => {
                let wanted = format!("{base}{SEQUENCE_FILE_SUFFIX}");
                find_ignore_case(dir, &wanted).is_some()
            }
        }
    }

    /// Path on disk (for sequences, the `.seq` file as it is actually cased).
    pub fn path(&self) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::Sequence { dir, base } => {
                let wanted = format!("{base}{SEQUENCE_FILE_SUFFIX}");
                find_ignore_case(dir, &wanted).unwrap_or_else(|| dir.join(wanted))
            }
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// True when every artifact is present.
pub fn all_exist(artifacts: &[Artifact]) -> bool {
    artifacts.iter().all(Artifact::exists)
}

fn find_ignore_case(dir: &Path, wanted: &str) -> Option<PathBuf> {
    let exact = dir.join(wanted);
    if exact.is_file() {
        return Some(exact);
    }
    fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .find(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.eq_ignore_ascii_case(wanted))
        })
        .map(|e| e.path())
}

/// Frames of the sequence `base` in `dir`: `{base}_NNNNN.fit[s]`, prefix
/// matched ignoring ASCII case. Sorted by path.
pub fn sequence_frames(dir: &Path, base: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let prefix = format!("{}_", base.to_ascii_lowercase());
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_fits_file(&path) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let lower = stem.to_ascii_lowercase();
        let is_frame = lower
            .strip_prefix(&prefix)
            .is_some_and(|idx| !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()));
        if is_frame {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

/// Delete the `.seq` file and every numbered frame of sequence `base` in
/// `dir`. Returns how many files were removed.
///
/// A rebuilt sequence may have fewer frames than the one it replaces, and
/// [`sequence_frames`] would otherwise still list the leftovers.
pub fn remove_sequence(dir: &Path, base: &str) -> Result<usize> {
    let mut removed = 0;
    for frame in sequence_frames(dir, base)? {
        fs::remove_file(frame)?;
        removed += 1;
    }
    if let Some(seq) = find_ignore_case(dir, &format!("{base}{SEQUENCE_FILE_SUFFIX}")) {
        fs::remove_file(seq)?;
        removed += 1;
    }
    Ok(removed)
}
