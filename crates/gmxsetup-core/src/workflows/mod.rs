//! # Workflows Module
//!
//! One entry point per setup stage, plus a driver that chains them.
//!
//! ## Overview
//!
//! Every stage runs inside its own directory below the project root, calls the GROMACS
//! tools it needs through the context's [`crate::core::tools::ToolRunner`], checks that
//! the expected files were produced, and returns a [`StageOutput`] naming them. The same
//! output is written to `outputs.toml` in the stage directory so that a later invocation
//! can pick up where this one stopped.
//!
//! ## Stages
//!
//! - **Topology** ([`topology`]) - `pdb2gmx` on the input structure
//! - **Solvation** ([`solvate`]) - Box, water, neutralizing and free ions, main index
//! - **Energy minimization** ([`minimize`]) - Run input and the minimization itself
//! - **MD setup** ([`md`]) - mdp, run input and job script for restrained or
//!   equilibrium MD
//! - **Pipeline** ([`pipeline`]) - All of the above in sequence

pub mod md;
pub mod minimize;
pub mod pipeline;
pub mod solvate;
pub mod topology;

use crate::core::mdp::MdpParams;
use crate::engine::context::SetupContext;
use crate::engine::error::SetupError;
use crate::engine::state::{SetupWarning, StageOutput, WarningKind};
use crate::engine::workdir::StageDir;

/// mdp overrides without a matching template line are handed to `grompp` as options.
fn check_mdp_args(ctx: &SetupContext, unprocessed: &MdpParams) -> Option<SetupWarning> {
    if unprocessed.is_empty() {
        return None;
    }
    let listed = unprocessed
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    Some(ctx.warn(
        WarningKind::Usage,
        format!(
            "Unprocessed mdp options are interpreted as options for grompp: {}",
            listed
        ),
    ))
}

/// Attaches the collected warnings and writes the manifest into the stage directory.
fn finish(
    dir: &StageDir,
    mut output: StageOutput,
    warnings: Vec<SetupWarning>,
) -> Result<StageOutput, SetupError> {
    output.warnings = warnings;
    output.save(dir.path())?;
    Ok(output)
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::core::templates::TemplateStore;
    use crate::core::tools::mock::{MockRunner, ok, touch};
    use crate::core::tools::{Invocation, ToolArg, ToolError, ToolOutput};
    use crate::engine::context::SetupContext;
    use crate::engine::progress::{Progress, ProgressReporter};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// A project directory with a recording progress reporter.
    pub(crate) struct Fixture {
        pub root: TempDir,
        pub templates: TemplateStore,
        pub reporter: ProgressReporter<'static>,
        pub events: Arc<Mutex<Vec<Progress>>>,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&events);
            Self {
                root: tempfile::tempdir().unwrap(),
                templates: TemplateStore::new(),
                reporter: ProgressReporter::with_callback(Box::new(move |event| {
                    sink.lock().unwrap().push(event)
                })),
                events,
            }
        }

        pub(crate) fn ctx<'a>(&'a self, runner: &'a MockRunner) -> SetupContext<'a> {
            SetupContext::new(runner, &self.templates, &self.reporter, self.root.path())
        }

        pub(crate) fn path(&self, rel: &str) -> PathBuf {
            self.root.path().join(rel)
        }

        /// Creates `rel` (and its parent directories) below the project root.
        pub(crate) fn file(&self, rel: &str, contents: &str) -> PathBuf {
            let path = self.path(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, contents).unwrap();
            path
        }

        pub(crate) fn read(&self, rel: &str) -> String {
            std::fs::read_to_string(self.path(rel)).unwrap()
        }

        pub(crate) fn stage_names(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    Progress::StageStart { name } => Some(*name),
                    _ => None,
                })
                .collect()
        }
    }

    /// `grompp` stand-in: writes the run input and reports a net charge of -2 for the
    /// freshly solvated system only.
    pub(crate) fn fake_grompp(inv: &Invocation) -> Result<ToolOutput, ToolError> {
        touch(inv, "o");
        let coordinates = inv.get("c").and_then(ToolArg::as_value).unwrap_or_default();
        if Path::new(coordinates).ends_with("solvated.gro") {
            ok("NOTE 1 [file system.top, line 40]:\n  System has non-zero total charge: -2.000000\n")
        } else {
            ok("Writing run input file...\n")
        }
    }
}
