use crate::core::templates::{Template, TemplateStore};
use crate::core::tools::{Invocation, ToolOutput, ToolRunner};
use crate::engine::error::SetupError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{SetupWarning, WarningKind};
use crate::engine::workdir::{self, StageDir};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything a stage needs besides its own configuration.
pub struct SetupContext<'a> {
    pub runner: &'a dyn ToolRunner,
    pub templates: &'a TemplateStore,
    pub reporter: &'a ProgressReporter<'a>,
    root: PathBuf,
}

impl<'a> SetupContext<'a> {
    /// `root` is the project directory; stage directories and relative input paths are
    /// resolved against it.
    pub fn new(
        runner: &'a dyn ToolRunner,
        templates: &'a TemplateStore,
        reporter: &'a ProgressReporter<'a>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            templates,
            reporter,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Makes `path` absolute against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Resolves `path` and checks that it exists.
    pub fn resolve_existing(&self, name: &'static str, path: &Path) -> Result<PathBuf, SetupError> {
        let resolved = self.resolve(path);
        if resolved.exists() {
            Ok(resolved)
        } else {
            Err(SetupError::InvalidParameter {
                name,
                reason: format!("file {:?} does not exist", resolved),
            })
        }
    }

    pub fn run(&self, invocation: Invocation) -> Result<ToolOutput, SetupError> {
        self.reporter.report(Progress::ToolStart {
            tool: invocation.tool,
        });
        info!("{}", invocation.command_line());
        Ok(self.runner.run(&invocation)?)
    }

    pub fn template(&self, reference: &str) -> Result<Template, SetupError> {
        Ok(self.templates.resolve(reference)?)
    }

    pub fn in_dir<T>(
        &self,
        dirname: &str,
        block: impl FnOnce(&StageDir) -> Result<T, SetupError>,
    ) -> Result<T, SetupError> {
        workdir::in_dir(&self.root, dirname, block)
    }

    /// Logs and reports a warning and hands it back for the stage output.
    pub fn warn(&self, kind: WarningKind, message: impl Into<String>) -> SetupWarning {
        let warning = SetupWarning {
            kind,
            message: message.into(),
        };
        warn!("{}", warning);
        self.reporter.report(Progress::Warning(warning.clone()));
        warning
    }
}
