use super::{Session, print_stage_output};
use crate::cli::{GromacsArgs, RunArgs};
use crate::config::{self, FileConfig};
use crate::error::Result;
use gmxsetup::workflows;
use tracing::info;

pub async fn run(args: RunArgs, gromacs: &GromacsArgs) -> Result<()> {
    let file = FileConfig::load(args.config.as_deref(), &args.set_values)?;
    let session = Session::new(gromacs, &file)?;
    let pipeline = config::build_pipeline(&args, file)?;

    match &pipeline.topology {
        Some(topology) => println!("Starting setup from {}...", topology.structure.display()),
        None => println!("Starting setup from the existing topology..."),
    }
    info!("Invoking the setup pipeline...");
    let outputs = session.execute(|ctx| workflows::pipeline::run(ctx, &pipeline))?;

    for output in &outputs {
        print_stage_output(output);
    }
    let warnings: usize = outputs.iter().map(|o| o.warnings.len()).sum();
    println!(
        "Setup finished: {} stage(s), {} warning(s).",
        outputs.len(),
        warnings
    );
    if let Some(script) = outputs.last().and_then(|o| o.job_script.as_ref()) {
        println!("Submit {} to start the run.", script.display());
    }
    Ok(())
}
