use std::path::PathBuf;

use nightstack_core::engine::script::{Normalization, Rejection, Resample};
use nightstack_core::error::NightstackError;
use nightstack_core::frame::FilterSelector;
use nightstack_core::pipeline::config::{
    default_channels, ChannelConfig, ExtractionConfig, PathsConfig, PipelineConfig,
};

fn config() -> PipelineConfig {
    PipelineConfig::new("NGC 281", PathsConfig::new("/data/repo", "/data/work"))
}

fn assert_missing(config: &PipelineConfig, needle: &str) {
    match config.validate() {
        Err(NightstackError::ConfigurationMissing(msg)) => {
            assert!(msg.contains(needle), "expected {needle:?} in {msg:?}")
        }
        other => panic!("expected ConfigurationMissing, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_default_config_is_valid() {
    config().validate().unwrap();
}

#[test]
fn test_default_paths_live_under_repo_and_work() {
    let paths = PathsConfig::new("/data/repo", "/data/work");
    assert_eq!(paths.masters_raw_dir(), PathBuf::from("/data/repo/masters-raw"));
    assert_eq!(paths.masters_dir(), PathBuf::from("/data/work/masters"));
    assert_eq!(paths.process_dir(), PathBuf::from("/data/work/process"));
    assert_eq!(paths.deliverables_dir(), PathBuf::from("/data/work/targets"));

    let mut custom = paths.clone();
    custom.process = Some(PathBuf::from("/fast/process"));
    assert_eq!(custom.process_dir(), PathBuf::from("/fast/process"));
}

#[test]
fn test_default_channels_follow_dual_band_recipe() {
    let channels = default_channels();
    let names: Vec<_> = channels.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Sii", "Ha", "OIII"]);
    assert_eq!(channels[2].filter, FilterSelector::Any);
    assert_eq!(config().reference_channel(), Some(1));
}

#[test]
fn test_default_stacking_parameters() {
    let c = config();
    assert_eq!(c.calibration.bias_stack.normalization, Normalization::None);
    assert_eq!(
        c.calibration.flat_stack.normalization,
        Normalization::Multiplicative
    );
    assert!(matches!(
        c.stacking.params.rejection,
        Rejection::Generalized { .. }
    ));
    assert!(c.stacking.mirror_x);
    assert!(c.calibration.equalize_cfa);
    assert_eq!(c.lights.background_degree, 1);
    assert_eq!(c.engine.requires.as_deref(), Some("1.4.0-beta3"));
}

// ---------------------------------------------------------------------------
// Channel matching
// ---------------------------------------------------------------------------

#[test]
fn test_channel_accepts() {
    let sii = ChannelConfig::new("Sii", "SiiOiii", Some("Ha"));
    assert!(sii.accepts("SiiOiii", Some("Ha")));
    assert!(sii.accepts("siioiii", Some("HA")));
    assert!(!sii.accepts("HaOiii", Some("Ha")));
    assert!(!sii.accepts("SiiOiii", Some("OIII")));
    assert!(!sii.accepts("SiiOiii", None));

    let lum = ChannelConfig::new("L", "L", None);
    assert!(lum.accepts("L", None));
    assert!(!lum.accepts("L", Some("Ha")));
}

#[test]
fn test_extraction_applies_to() {
    let all = ExtractionConfig::default();
    assert!(all.applies_to("anything"));
    let some = ExtractionConfig {
        resample: None,
        configs: vec!["HaOiii".into()],
    };
    assert!(some.applies_to("haoiii"));
    assert!(!some.applies_to("L"));
    assert!(some.produces("oiii"));
    assert!(!some.produces("Sii"));
}

#[test]
fn test_formula_for() {
    let c = config();
    let f = c.renormalize.formula_for("a", "b");
    assert_eq!(
        f,
        "$a$*mad($b$)/mad($a$)-mad($b$)/mad($a$)*median($a$)+median($b$)"
    );
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_validate_empty_target() {
    let mut c = config();
    c.target = "  ".into();
    assert_missing(&c, "target");
}

#[test]
fn test_validate_no_channels() {
    let mut c = config();
    c.channels.clear();
    assert_missing(&c, "no output channels");
}

#[test]
fn test_validate_duplicate_channel() {
    let mut c = config();
    c.channels.push(ChannelConfig::new("ha", "HaOiii", Some("Ha")));
    assert_missing(&c, "twice");
}

#[test]
fn test_validate_variant_without_extraction() {
    let mut c = config();
    c.lights.extraction = None;
    assert_missing(&c, "lights.extraction");
}

#[test]
fn test_validate_unknown_variant() {
    let mut c = config();
    c.channels[0].variant = Some("Sii".into());
    assert_missing(&c, "variant `Sii`");
}

#[test]
fn test_validate_variant_from_config_that_is_not_split() {
    let mut c = config();
    c.lights.extraction = Some(ExtractionConfig {
        configs: vec!["HaOiii".into()],
        ..Default::default()
    });
    // Sii wants the red channel of SiiOiii, which is now stacked whole.
    assert_missing(&c, "channel `Sii` can never be stacked");
}

#[test]
fn test_validate_whole_channel_from_split_config() {
    let mut c = config();
    c.channels.push(ChannelConfig::new("L", "HaOiii", None));
    assert_missing(&c, "channel `L` can never be stacked");

    let mut c = config();
    c.channels.push(ChannelConfig::new("All", "*", None));
    assert_missing(&c, "channel `All`");
}

#[test]
fn test_validate_mixed_split_and_whole_configs() {
    let mut c = config();
    c.lights.extraction = Some(ExtractionConfig {
        configs: vec!["HaOiii".into(), "SiiOiii".into()],
        ..Default::default()
    });
    c.channels.push(ChannelConfig::new("L", "L", None));
    c.channels.push(ChannelConfig::new("All", "*", None));
    c.validate().unwrap();
}

#[test]
fn test_validate_reference_must_be_a_channel() {
    let mut c = config();
    c.renormalize.reference = "Hb".into();
    assert_missing(&c, "renormalize.reference");
}

#[test]
fn test_validate_formula_placeholders() {
    let mut c = config();
    c.renormalize.formula = "$image$*2".into();
    assert_missing(&c, "{image}");
}

#[test]
fn test_validate_bias_date() {
    let mut c = config();
    c.calibration.bias_date = Some("last tuesday".into());
    assert_missing(&c, "bias_date");
    c.calibration.bias_date = Some("2025-09-09".into());
    c.validate().unwrap();
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[test]
fn test_config_json_roundtrip() {
    let mut c = config();
    c.calibration.bias_date = Some("2025-09-09".into());
    let json = serde_json::to_string(&c).unwrap();
    let back: PipelineConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.target, "NGC 281");
    assert_eq!(back.calibration.bias_date.as_deref(), Some("2025-09-09"));
    assert_eq!(back.channels, c.channels);
    assert_eq!(back.stacking.params, c.stacking.params);
    assert_eq!(back.renormalize.register, c.renormalize.register);
}

#[test]
fn test_default_config_toml_roundtrip() {
    let c = config();
    let text = toml::to_string_pretty(&c).unwrap();
    assert!(text.contains("[[channels]]"), "got: {text}");
    assert!(text.contains("filter = \"*\""), "got: {text}");

    let back: PipelineConfig = toml::from_str(&text).unwrap();
    assert_eq!(back.channels, c.channels);
    assert_eq!(back.calibration.flat_stack, c.calibration.flat_stack);
    back.validate().unwrap();
}

#[test]
fn test_minimal_toml_gets_defaults() {
    let text = r#"
        target = "NGC 281"

        [paths]
        repo = "/data/repo"
        work = "/data/work"
    "#;
    let c: PipelineConfig = toml::from_str(text).unwrap();
    assert_eq!(c.channels, default_channels());
    assert_eq!(c.engine.program, "org.siril.Siril");
    assert_eq!(c.renormalize.reference, "Ha");
    assert_eq!(
        c.lights.extraction.as_ref().and_then(|e| e.resample),
        Some(Resample::Ha)
    );
    c.validate().unwrap();
}

#[test]
fn test_toml_overrides() {
    let text = r#"
        target = "M 31"

        [paths]
        repo = "/data/repo"
        work = "/data/work"
        scratch = "/fast/tmp"

        [calibration]
        bias_date = "2025-09-09"

        [calibration.flat_stack]
        normalization = "multiplicative_scale"
        rejection = { method = "winsorized", low = 3.0, high = 3.0 }

        [lights]
        background_degree = 2

        [[channels]]
        name = "L"
        filter = "L"

        [renormalize]
        reference = "L"
    "#;
    let c: PipelineConfig = toml::from_str(text).unwrap();
    assert_eq!(c.paths.scratch, Some(PathBuf::from("/fast/tmp")));
    assert_eq!(
        c.calibration.flat_stack.normalization,
        Normalization::MultiplicativeScale
    );
    assert_eq!(
        c.calibration.flat_stack.rejection,
        Rejection::Winsorized {
            low: 3.0,
            high: 3.0
        }
    );
    // Untouched parts of a section keep their defaults.
    assert_eq!(c.calibration.bias_stack.normalization, Normalization::None);
    assert_eq!(c.lights.background_degree, 2);
    // Naming [lights] without an extraction table turns extraction off.
    assert!(c.lights.extraction.is_none());
    assert_eq!(c.channels.len(), 1);
    c.validate().unwrap();
}
