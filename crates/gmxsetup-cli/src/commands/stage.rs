use super::{Session, print_stage_output};
use crate::cli::{GromacsArgs, MdArgs, MinimizeArgs, SolvateArgs, TopologyArgs};
use crate::config::{self, FileConfig};
use crate::error::Result;
use gmxsetup::workflows;
use tracing::info;

pub async fn topology(args: TopologyArgs, gromacs: &GromacsArgs) -> Result<()> {
    let mut file = FileConfig::load(args.stage.config.as_deref(), &args.stage.set_values)?;
    let session = Session::new(gromacs, &file)?;
    let config = config::build_topology(&args, &mut file)?;

    println!("Building topology for {}...", config.structure.display());
    info!("Invoking the topology stage...");
    let output = session.execute(|ctx| workflows::topology::run(ctx, &config))?;

    print_stage_output(&output);
    Ok(())
}

pub async fn solvate(args: SolvateArgs, gromacs: &GromacsArgs) -> Result<()> {
    let mut file = FileConfig::load(args.stage.config.as_deref(), &args.stage.set_values)?;
    let session = Session::new(gromacs, &file)?;
    let previous = config::load_previous(&args.stage)?;
    let config = config::build_solvate(&args, &mut file, previous.as_ref());

    println!(
        "Solvating {} ({} box, {} nm)...",
        config.structure.display(),
        config.boxtype,
        config.distance
    );
    info!("Invoking the solvation stage...");
    let output = session.execute(|ctx| workflows::solvate::run(ctx, &config))?;

    print_stage_output(&output);
    Ok(())
}

pub async fn minimize(args: MinimizeArgs, gromacs: &GromacsArgs) -> Result<()> {
    let mut file = FileConfig::load(args.stage.config.as_deref(), &args.stage.set_values)?;
    let session = Session::new(gromacs, &file)?;
    let previous = config::load_previous(&args.stage)?;
    let config = config::build_minimize(&args, &mut file, previous.as_ref());

    println!("Energy minimizing {}...", config.structure.display());
    info!("Invoking the energy minimization stage...");
    let output = session.execute(|ctx| workflows::minimize::run(ctx, &config))?;

    print_stage_output(&output);
    Ok(())
}

/// Prepares the restrained run, or the unrestrained one with `equilibrium`.
pub async fn md(args: MdArgs, gromacs: &GromacsArgs, equilibrium: bool) -> Result<()> {
    let mut file = FileConfig::load(args.stage.config.as_deref(), &args.stage.set_values)?;
    let session = Session::new(gromacs, &file)?;
    let previous = config::load_previous(&args.stage)?;
    let config = config::build_md(&args, &mut file, previous.as_ref(), equilibrium);

    println!(
        "Preparing {} ps of MD in {}/...",
        config.runtime, config.dirname
    );
    let output = session.execute(|ctx| {
        if equilibrium {
            info!("Invoking the MD setup stage...");
            workflows::md::equilibrium(ctx, &config)
        } else {
            info!("Invoking the restrained MD setup stage...");
            workflows::md::restrained(ctx, &config)
        }
    })?;

    print_stage_output(&output);
    if let Some(script) = &output.job_script {
        println!("Submit {} to start the run.", script.display());
    }
    Ok(())
}
