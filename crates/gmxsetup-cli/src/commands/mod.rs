pub mod run;
pub mod stage;
pub mod templates;

use crate::cli::GromacsArgs;
use crate::config::{FileConfig, build_runner, build_templates};
use crate::data::TemplateLibrary;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use gmxsetup::core::templates::TemplateStore;
use gmxsetup::core::tools::GromacsRunner;
use gmxsetup::engine::context::SetupContext;
use gmxsetup::engine::error::SetupError;
use gmxsetup::engine::progress::ProgressReporter;
use gmxsetup::engine::state::{MANIFEST_NAME, StageOutput};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Everything needed to run stages in one project directory.
pub struct Session {
    runner: GromacsRunner,
    templates: TemplateStore,
    root: PathBuf,
    progress: CliProgressHandler,
}

impl Session {
    pub fn new(args: &GromacsArgs, file: &FileConfig) -> Result<Self> {
        let root = std::path::absolute(&args.root)?;
        let library = user_library();
        let gromacs = file.gromacs.as_ref();
        let resolved_args = GromacsArgs {
            root: root.clone(),
            ..args.clone()
        };

        debug!("Project directory: {:?}", root);
        Ok(Self {
            runner: build_runner(args, gromacs),
            templates: build_templates(&resolved_args, gromacs, library.as_deref()),
            root,
            progress: CliProgressHandler::new(),
        })
    }

    /// Runs stage work on this thread with a context wired to the progress display.
    pub fn execute<T>(
        &self,
        work: impl FnOnce(&SetupContext) -> std::result::Result<T, SetupError>,
    ) -> Result<T> {
        let reporter = ProgressReporter::with_callback(self.progress.get_callback());
        let ctx = SetupContext::new(&self.runner, &self.templates, &reporter, &self.root);
        Ok(tokio::task::block_in_place(|| work(&ctx))?)
    }
}

/// The user's template directory, if its location can be determined.
pub fn user_library() -> Option<PathBuf> {
    match TemplateLibrary::new() {
        Ok(library) => Some(library.path().to_path_buf()),
        Err(e) => {
            warn!("User template directory unavailable: {}", e);
            None
        }
    }
}

pub fn print_stage_output(output: &StageOutput) {
    println!("Stage '{}':", output.stage);
    println!("  structure:  {}", output.structure.display());
    let paths = [
        ("topology", &output.topology),
        ("index", &output.ndx),
        ("run input", &output.tpr),
        ("job script", &output.job_script),
    ];
    for (label, path) in paths {
        if let Some(path) = path {
            println!("  {:<11} {}", format!("{}:", label), path.display());
        }
    }
    if let Some(qtot) = output.qtot {
        println!("  {:<11} {}", "qtot:", qtot);
    }
    if let Some(dir) = output.structure.parent() {
        println!("  {:<11} {}", "outputs:", dir.join(MANIFEST_NAME).display());
    }
    if !output.warnings.is_empty() {
        println!("  {} warning(s):", output.warnings.len());
        for warning in &output.warnings {
            println!("    {}", warning);
        }
    }
}
