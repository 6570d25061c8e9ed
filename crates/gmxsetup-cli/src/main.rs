mod cli;
mod commands;
mod config;
mod data;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use clap::Parser;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("gmxsetup CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let gromacs = cli.gromacs;
    let command_result = match cli.command {
        Commands::Topology(args) => {
            info!("Dispatching to 'topology' command.");
            commands::stage::topology(args, &gromacs).await
        }
        Commands::Solvate(args) => {
            info!("Dispatching to 'solvate' command.");
            commands::stage::solvate(args, &gromacs).await
        }
        Commands::Minimize(args) => {
            info!("Dispatching to 'minimize' command.");
            commands::stage::minimize(args, &gromacs).await
        }
        Commands::Restrained(args) => {
            info!("Dispatching to 'restrained' command.");
            commands::stage::md(args, &gromacs, false).await
        }
        Commands::Md(args) => {
            info!("Dispatching to 'md' command.");
            commands::stage::md(args, &gromacs, true).await
        }
        Commands::Run(args) => {
            info!("Dispatching to 'run' command.");
            commands::run::run(args, &gromacs).await
        }
        Commands::Templates(args) => {
            info!("Dispatching to 'templates' command.");
            commands::templates::run(args, &gromacs).await
        }
    };

    match &command_result {
        Ok(_) => {
            info!("✅ Command completed successfully.");
            println!("✅ Command completed successfully.");
        }
        Err(e) => error!("❌ Command failed: {}", e),
    }

    command_result
}
