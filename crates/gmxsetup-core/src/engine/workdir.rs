use crate::core::tools::{Invocation, Tool};
use crate::engine::error::SetupError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The working directory of one setup stage.
///
/// Tools are started with [`StageDir::invocation`], which pins their working directory to
/// the stage directory; the working directory of the process itself is never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDir {
    path: PathBuf,
}

impl StageDir {
    /// Creates the directory (and its parents) if needed.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, SetupError> {
        let path = path.into();
        std::fs::create_dir_all(&path).map_err(SetupError::io(&path))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    pub fn contains(&self, name: impl AsRef<Path>) -> bool {
        self.join(name).exists()
    }

    /// Path of `name`, or [`SetupError::MissingOutput`] if the stage did not produce it.
    pub fn require(&self, stage: &'static str, name: impl AsRef<Path>) -> Result<PathBuf, SetupError> {
        let path = self.join(name);
        if path.exists() {
            Ok(path)
        } else {
            Err(SetupError::MissingOutput { stage, path })
        }
    }

    pub fn write(&self, name: impl AsRef<Path>, contents: &str) -> Result<PathBuf, SetupError> {
        let path = self.join(name);
        std::fs::write(&path, contents).map_err(SetupError::io(&path))?;
        Ok(path)
    }

    pub fn copy(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<PathBuf, SetupError> {
        let source = self.join(from);
        let target = self.join(to);
        std::fs::copy(&source, &target).map_err(SetupError::io(&source))?;
        Ok(target)
    }

    pub fn remove_if_exists(&self, name: impl AsRef<Path>) -> Result<(), SetupError> {
        let path = self.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SetupError::Io { path, source: e }),
        }
    }

    /// Starts describing a call of `tool` that runs inside this directory.
    pub fn invocation(&self, tool: Tool) -> Invocation {
        Invocation::new(tool).in_dir(&self.path)
    }
}

/// Runs `block` for the stage directory `root/dirname`, creating it first.
pub fn in_dir<T>(
    root: &Path,
    dirname: &str,
    block: impl FnOnce(&StageDir) -> Result<T, SetupError>,
) -> Result<T, SetupError> {
    let dir = StageDir::create(root.join(dirname))?;
    debug!("Entering stage directory {:?}", dir.path());
    let result = block(&dir);
    debug!("Leaving stage directory {:?}", dir.path());
    result
}
