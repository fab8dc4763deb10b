//! Canonical names and paths of every derived artifact.
//!
//! Everything here is a pure function of its arguments. A name doubles as the
//! cache key of the artifact: the same logical inputs always give the same
//! name, and the `_s{session}_c{config}` qualifiers keep per-session artifacts
//! apart from each other and from the cross-session ones.

use std::path::{Path, PathBuf};

use crate::consts::{
    BACKGROUND_PREFIX, CALIBRATED_PREFIX, REGISTERED_PREFIX, SEQUENCE_FILE_SUFFIX,
    SEQUENCE_FRAME_EXTENSION, SEQUENCE_INDEX_WIDTH,
};
use crate::frame::{FilterSelector, SessionId};

/// `_s{session}_c{config}`, always session first. Session ids are strict dates
/// and config labels never contain `_`, so the pair can be read back unambiguously.
pub fn session_qualifier(session: &SessionId, config: &str) -> String {
    format!("_s{}_c{}", session, config)
}

/// Master bias for one calibration date.
pub fn master_bias_path(masters: &Path, date: &SessionId) -> PathBuf {
    masters.join("biases").join(format!("{}_stacked.fits", date))
}

pub fn flat_base(session: &SessionId, config: &str) -> String {
    format!("flat{}", session_qualifier(session, config))
}

/// Master flat for one (session, config) pair.
pub fn master_flat_path(process: &Path, session: &SessionId, config: &str) -> PathBuf {
    process.join(format!("{}.fits", flat_base(session, config)))
}

/// Sequence base of the raw lights of one (session, config) pair.
pub fn light_base(session: &SessionId, config: &str) -> String {
    format!("light{}", session_qualifier(session, config))
}

/// Prefix `base` with the engine's calibration marker.
pub fn calibrated(base: &str) -> String {
    format!("{CALIBRATED_PREFIX}{base}")
}

/// Prefix `base` with the engine's background-removal marker.
pub fn background_removed(base: &str) -> String {
    format!("{BACKGROUND_PREFIX}{base}")
}

/// Prefix `base` with the engine's registration marker.
pub fn registered(base: &str) -> String {
    format!("{REGISTERED_PREFIX}{base}")
}

/// Prefix `base` with an extracted channel variant (`Ha_`, `OIII_`).
pub fn extracted(variant: &str, base: &str) -> String {
    format!("{variant}_{base}")
}

/// Final per-session light sequence: `[{variant}_]bkg_pp_light_s…_c…`.
pub fn calibrated_light_base(session: &SessionId, config: &str, variant: Option<&str>) -> String {
    let base = background_removed(&calibrated(&light_base(session, config)));
    match variant {
        Some(v) => extracted(v, &base),
        None => base,
    }
}

/// Sequence a channel's frames are merged into before registration.
pub fn merged_base(variant: Option<&str>) -> String {
    let base = background_removed(&calibrated("light"));
    match variant {
        Some(v) => format!("all_{}", extracted(v, &base)),
        None => format!("all_{base}"),
    }
}

/// The `.seq` file the engine writes for a sequence.
pub fn sequence_file(dir: &Path, base: &str) -> PathBuf {
    dir.join(format!("{base}{SEQUENCE_FILE_SUFFIX}"))
}

/// Name of frame `index` (1-based) of a sequence, without extension. This is
/// how pixel math and `load` refer to it.
pub fn sequence_frame_stem(base: &str, index: usize) -> String {
    format!("{base}_{index:0width$}", width = SEQUENCE_INDEX_WIDTH)
}

/// File name of frame `index` (1-based) of a sequence.
pub fn sequence_frame(base: &str, index: usize) -> String {
    format!(
        "{}.{SEQUENCE_FRAME_EXTENSION}",
        sequence_frame_stem(base, index)
    )
}

/// Cross-session stack of one channel.
pub fn channel_stack_path(process: &Path, channel: &str, selector: &FilterSelector) -> PathBuf {
    process.join(format!(
        "stack_{}_c{}.{SEQUENCE_FRAME_EXTENSION}",
        channel,
        selector.qualifier()
    ))
}

/// Filesystem-safe target name: spaces removed, uppercased.
pub fn normalize_target_name(target: &str) -> String {
    target.replace(' ', "").to_uppercase()
}

pub fn deliverables_dir(deliverables: &Path, target: &str) -> PathBuf {
    deliverables.join(normalize_target_name(target))
}

/// Final renormalized image of one channel.
pub fn deliverable_path(deliverables: &Path, target: &str, channel: &str) -> PathBuf {
    deliverables_dir(deliverables, target).join(format!("stacked_{channel}.fits"))
}

/// Path without its extension, the form the engine expects for masters.
pub fn strip_extension(path: &Path) -> PathBuf {
    path.with_extension("")
}
