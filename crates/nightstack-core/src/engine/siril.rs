use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, error, info, warn};

use crate::error::{NightstackError, Result};

use super::{EngineOutput, ProcessingEngine, Script};

/// Siril in headless script mode: `{program} -d {workdir} -s -`, script on stdin.
pub struct SirilEngine {
    program: String,
}

impl SirilEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ProcessingEngine for SirilEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn run(&self, workdir: &Path, script: &Script) -> Result<EngineOutput> {
        let text = script.render();
        debug!(workdir = %workdir.display(), script = %text, "Running Siril");

        let spawn_err = |source| NightstackError::EngineUnavailable {
            program: self.program.clone(),
            source,
        };
        let mut child = Command::new(&self.program)
            .arg("-d")
            .arg(workdir)
            .args(["-s", "-"])
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            // An engine that exits early closes the pipe; its exit status tells why.
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }
        let output = child.wait_with_output()?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        for line in stdout.lines() {
            debug!("{line}");
        }
        for line in stderr.lines() {
            warn!("{line}");
        }

        let result = EngineOutput {
            status: output.status.code(),
            stdout,
            stderr,
        };
        if result.success() {
            info!("Siril command successful");
        } else {
            error!(status = ?result.status, "Siril command failed");
        }
        Ok(result)
    }
}
