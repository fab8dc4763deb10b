use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;

use nightstack_core::cache::sequence_frames;
use nightstack_core::engine::script::Directive;
use nightstack_core::engine::{EngineOutput, ProcessingEngine, Script};
use nightstack_core::error::Result;
use nightstack_core::naming;
use nightstack_core::pipeline::config::{PathsConfig, PipelineConfig};

pub const TARGET: &str = "NGC 281";
pub const SESSION: &str = "2025-09-16";
pub const BIAS_DATE: &str = "2025-09-09";
pub const CONFIGS: [&str; 2] = ["HaOiii", "SiiOiii"];

/// One call the engine received.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub workdir: PathBuf,
    /// File names present in the workdir when the engine started.
    pub inputs: Vec<String>,
    pub script: Script,
}

impl Invocation {
    pub fn text(&self) -> String {
        self.script.render()
    }
}

type FailWhen = Box<dyn Fn(&Script) -> bool + Send + Sync>;

/// Stand-in for the processing engine.
///
/// Interprets the directives against the filesystem just enough for the
/// pipeline's existence checks: sequences become `{base}_.seq` plus one
/// `.fit` per frame, stacks and saves become files.
pub struct FakeEngine {
    calls: Mutex<Vec<Invocation>>,
    fail_when: Option<FailWhen>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_when: None,
        }
    }

    /// Exit nonzero, without writing anything, for scripts matching `pred`.
    pub fn failing_when(pred: impl Fn(&Script) -> bool + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_when: Some(Box::new(pred)),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn interpret(&self, workdir: &Path, script: &Script) -> std::result::Result<(), String> {
        let mut cwd = workdir.to_path_buf();
        for directive in script.directives() {
            match directive {
                Directive::Requires(_) | Directive::Comment(_) | Directive::UpdateKey { .. } => {}
                Directive::Link { base, out } => {
                    let frames = fits_in(&cwd);
                    if frames.is_empty() {
                        return Err(format!("link {base}: no images in {}", cwd.display()));
                    }
                    let dest = out.clone().unwrap_or_else(|| cwd.clone());
                    write_sequence(&dest, base, frames.len());
                }
                Directive::Cd(dir) => cwd = cwd.join(dir),
                Directive::Calibrate {
                    sequence,
                    bias,
                    flat,
                    ..
                } => {
                    for master in bias.iter().chain(flat.iter()) {
                        if !master.with_extension("fits").is_file() {
                            return Err(format!("calibrate: no master {}", master.display()));
                        }
                    }
                    derive(&cwd, sequence, &[naming::calibrated(sequence)])?;
                }
                Directive::SubtractSky { sequence, .. } => {
                    derive(&cwd, sequence, &[naming::background_removed(sequence)])?;
                }
                Directive::ExtractHaOiii { sequence, .. } => {
                    let outs = ["Ha", "OIII"].map(|v| naming::extracted(v, sequence));
                    derive(&cwd, sequence, &outs)?;
                }
                Directive::Register { sequence, .. } => {
                    derive(&cwd, sequence, &[naming::registered(sequence)])?;
                }
                Directive::Stack { sequence, out, .. } => {
                    let n = frame_count(&cwd, sequence)?;
                    write_file(&cwd.join(out), &format!("stack of {n}"))?;
                }
                Directive::MirrorX { image } => {
                    if !cwd.join(image).is_file() {
                        return Err(format!("mirrorx: no image {}", image.display()));
                    }
                }
                Directive::PixelMath(_) => {}
                Directive::Load(name) => {
                    let path = cwd.join(format!("{name}.fit"));
                    if !path.is_file() {
                        return Err(format!("load: no image {}", path.display()));
                    }
                }
                Directive::Save(path) => write_file(&cwd.join(path), "image")?,
            }
        }
        Ok(())
    }
}

impl ProcessingEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn run(&self, workdir: &Path, script: &Script) -> Result<EngineOutput> {
        let mut inputs: Vec<String> = fs::read_dir(workdir)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        inputs.sort();
        self.calls.lock().unwrap().push(Invocation {
            workdir: workdir.to_path_buf(),
            inputs,
            script: script.clone(),
        });

        if self.fail_when.as_ref().is_some_and(|f| f(script)) {
            return Ok(EngineOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: "simulated engine failure".into(),
            });
        }
        Ok(match self.interpret(workdir, script) {
            Ok(()) => EngineOutput {
                status: Some(0),
                ..Default::default()
            },
            Err(msg) => EngineOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: msg,
            },
        })
    }
}

fn fits_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    files.retain(|p| nightstack_core::frame::is_fits_file(p));
    files.sort();
    files
}

fn frame_count(dir: &Path, sequence: &str) -> std::result::Result<usize, String> {
    let n = sequence_frames(dir, sequence).map_err(|e| e.to_string())?.len();
    if n == 0 {
        return Err(format!("sequence {sequence} not found in {}", dir.display()));
    }
    Ok(n)
}

fn derive(dir: &Path, from: &str, to: &[String]) -> std::result::Result<(), String> {
    let n = frame_count(dir, from)?;
    for base in to {
        write_sequence(dir, base, n);
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> std::result::Result<(), String> {
    fs::write(path, contents).map_err(|e| format!("write {}: {e}", path.display()))
}

/// `{base}_.seq` plus `frames` numbered frames in `dir`.
pub fn write_sequence(dir: &Path, base: &str, frames: usize) {
    fs::create_dir_all(dir).unwrap();
    fs::write(naming::sequence_file(dir, base), format!("{frames} images")).unwrap();
    for i in 1..=frames {
        fs::write(dir.join(naming::sequence_frame(base, i)), "frame").unwrap();
    }
}

/// A raw repository and a work directory inside one temp dir.
pub struct Fixture {
    pub root: TempDir,
    pub repo: PathBuf,
    pub work: PathBuf,
}

impl Fixture {
    pub fn empty() -> Self {
        let root = TempDir::new().unwrap();
        let repo = root.path().join("repo");
        let work = root.path().join("work");
        fs::create_dir_all(&repo).unwrap();
        fs::create_dir_all(&work).unwrap();
        Self { root, repo, work }
    }

    /// The NGC 281 layout: one session with HaOiii and SiiOiii flats and
    /// lights, and one bias date, three frames each.
    pub fn ngc281() -> Self {
        let fx = Self::empty();
        for config in CONFIGS {
            fx.add_frames(SESSION, "FLAT", config, 3, 1.5);
            fx.add_frames(SESSION, "LIGHT", config, 3, 300.0);
        }
        fx.add_bias(BIAS_DATE, 3);
        fx
    }

    pub fn session_dir(&self, session: &str, frame_type: &str) -> PathBuf {
        self.repo.join(TARGET).join(session).join(frame_type)
    }

    pub fn add_frames(&self, session: &str, frame_type: &str, config: &str, n: usize, exposure: f32) {
        let dir = self.session_dir(session, frame_type);
        fs::create_dir_all(&dir).unwrap();
        for i in 1..=n {
            let name = format!("{session}_21-0{i}-00_{config}_-10_{exposure}s_{i:04}.fits");
            fs::write(dir.join(name), "raw").unwrap();
        }
    }

    pub fn add_bias(&self, date: &str, n: usize) {
        let dir = self.repo.join("masters-raw").join(date).join("BIAS");
        fs::create_dir_all(&dir).unwrap();
        for i in 1..=n {
            let name = format!("{date}_18-00-0{i}_Bias_-10_0.001s_{i:04}.fits");
            fs::write(dir.join(name), "raw").unwrap();
        }
    }

    pub fn scratch(&self) -> PathBuf {
        self.root.path().join("scratch")
    }

    /// Default recipe with scratch kept inside the fixture.
    pub fn config(&self) -> PipelineConfig {
        let mut paths = PathsConfig::new(&self.repo, &self.work);
        paths.scratch = Some(self.scratch());
        PipelineConfig::new(TARGET, paths)
    }

    pub fn process(&self) -> PathBuf {
        self.work.join("process")
    }

    pub fn deliverables(&self) -> PathBuf {
        self.work.join("targets").join("NGC281")
    }
}
