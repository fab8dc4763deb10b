use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::consts::SCRATCH_PREFIX;
use crate::error::Result;

/// An input file and the name it gets inside the scratch directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageInput {
    pub path: PathBuf,
    pub link_name: String,
}

impl StageInput {
    /// Keep the file's own name.
    pub fn from_path(path: PathBuf) -> Self {
        let link_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, link_name }
    }

    pub fn renamed(path: PathBuf, link_name: impl Into<String>) -> Self {
        Self {
            path,
            link_name: link_name.into(),
        }
    }
}

/// A fresh directory the engine may scribble in, holding links to the
/// stage inputs. Removed when dropped, whatever the stage outcome.
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Create under `root` (or the system temp dir) and link `inputs` in.
    pub fn create(root: Option<&Path>, inputs: &[StageInput]) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        for input in inputs {
            link_input(&input.path, &dir.path().join(&input.link_name))?;
        }
        debug!(
            dir = %dir.path().display(),
            inputs = inputs.len(),
            "Prepared scratch workspace"
        );
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(unix)]
fn link_input(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(std::path::absolute(src)?, dst)
}

#[cfg(not(unix))]
fn link_input(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::copy(src, dst).map(|_| ())
}
