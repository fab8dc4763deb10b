/// Default engine executable (Siril installed as a flatpak).
pub const DEFAULT_ENGINE_PROGRAM: &str = "org.siril.Siril";

/// Minimum engine version written as the `requires` line of every script.
pub const DEFAULT_ENGINE_REQUIRES: &str = "1.4.0-beta3";

/// Prefix of the per-stage scratch directories.
pub const SCRATCH_PREFIX: &str = "nightstack_";

/// Suffix the engine appends to a sequence base name for its sequence file.
pub const SEQUENCE_FILE_SUFFIX: &str = "_.seq";

/// Extension used for frames the engine writes into a sequence.
pub const SEQUENCE_FRAME_EXTENSION: &str = "fit";

/// Zero padding of sequence frame indices (`base_00001.fit`).
pub const SEQUENCE_INDEX_WIDTH: usize = 5;

/// Prefix the engine gives to calibrated (pre-processed) sequences.
pub const CALIBRATED_PREFIX: &str = "pp_";

/// Prefix the engine gives to background-subtracted sequences.
pub const BACKGROUND_PREFIX: &str = "bkg_";

/// Prefix the engine gives to registered sequences.
pub const REGISTERED_PREFIX: &str = "r_";

/// Channel variants produced by a dual-narrowband extraction, in engine case.
pub const HA_OIII_VARIANTS: [&str; 2] = ["Ha", "OIII"];

/// Directory names of the raw frame types.
pub const BIAS_DIR: &str = "BIAS";
pub const DARK_DIR: &str = "DARK";
pub const FLAT_DIR: &str = "FLAT";
pub const LIGHT_DIR: &str = "LIGHT";

/// Sequence base used for the stacks while renormalizing.
pub const RENORMALIZE_SEQUENCE: &str = "renorm";

/// Pixel math matching median and MAD of `{image}` to `{reference}`.
pub const DEFAULT_RENORMALIZE_FORMULA: &str = "${image}$*mad(${reference}$)/mad(${image}$)-mad(${reference}$)/mad(${image}$)*median(${image}$)+median(${reference}$)";

/// Comment stored with the FILTER keyword of renormalized outputs.
pub const DEFAULT_FILTER_COMMENT: &str = "OSC dual Duo filter extracted";

/// Polynomial degree for per-frame background removal.
pub const DEFAULT_BACKGROUND_DEGREE: u32 = 1;
