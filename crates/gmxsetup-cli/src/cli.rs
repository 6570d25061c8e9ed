use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "gmxsetup - Stage-by-stage setup of GROMACS molecular-dynamics simulations: topology, solvation, energy minimization and MD run input.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(flatten)]
    pub gromacs: GromacsArgs,
}

/// How to find GROMACS and the templates; shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GromacsArgs {
    /// GROMACS driver program (GROMACS 5 and later), e.g. 'gmx' or 'gmx_mpi'
    #[arg(long, global = true, value_name = "PROGRAM", conflicts_with = "legacy")]
    pub gmx: Option<String>,

    /// Call the GROMACS 4 per-tool programs (grompp, mdrun, ...), with an optional
    /// suffix given as --legacy=_mpi
    #[arg(
        long,
        global = true,
        value_name = "SUFFIX",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = ""
    )]
    pub legacy: Option<String>,

    /// Project directory that holds the stage directories; relative input paths are
    /// resolved against it
    #[arg(short = 'C', long, global = true, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Additional directory searched for mdp and job-script templates (repeatable)
    #[arg(short = 'T', long = "template-dir", global = true, value_name = "DIR")]
    pub template_dirs: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the topology of a protein structure with pdb2gmx.
    Topology(TopologyArgs),
    /// Put the system into a water box and neutralize it with ions.
    Solvate(SolvateArgs),
    /// Energy minimize the solvated system.
    Minimize(MinimizeArgs),
    /// Prepare a position-restrained MD run (mdp, tpr and job script).
    Restrained(MdArgs),
    /// Prepare an unrestrained MD run (mdp, tpr and job script).
    Md(MdArgs),
    /// Run the whole setup: topology, solvation, minimization and restrained MD.
    Run(RunArgs),
    /// Inspect and customize the mdp and job-script templates.
    Templates(TemplatesArgs),
}

/// Arguments common to all stage commands.
#[derive(Args, Debug, Clone, Default)]
pub struct StageArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Continue from a previous stage: its outputs.toml or its directory.
    #[arg(long, value_name = "PATH")]
    pub from: Option<PathBuf>,

    /// Directory of this stage, relative to the project directory.
    #[arg(long, value_name = "DIR")]
    pub dirname: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S solvate.concentration=0.15
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `topology` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct TopologyArgs {
    /// Input protein structure (PDB).
    #[arg(short = 'f', long, value_name = "PATH")]
    pub structure: Option<PathBuf>,

    /// Force field passed to pdb2gmx (e.g. 'oplsaa').
    #[arg(long, value_name = "NAME")]
    pub ff: Option<String>,

    /// Water model passed to pdb2gmx (e.g. 'tip4p').
    #[arg(long, value_name = "NAME")]
    pub water: Option<String>,

    /// Base name of the processed structure and position restraint files.
    #[arg(long, value_name = "NAME")]
    pub protein: Option<String>,

    /// File name of the system topology.
    #[arg(long, value_name = "FILE")]
    pub top: Option<String>,

    #[command(flatten)]
    pub stage: StageArgs,
}

/// Arguments for the `solvate` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct SolvateArgs {
    /// Solute structure.
    #[arg(short = 'f', long, value_name = "PATH")]
    pub structure: Option<PathBuf>,

    /// System topology; ions are added to it in place.
    #[arg(short = 'p', long, value_name = "PATH")]
    pub topology: Option<PathBuf>,

    /// Minimum distance between solute and box in nm.
    #[arg(short = 'd', long, value_name = "NM")]
    pub distance: Option<f64>,

    /// Box type (triclinic, cubic, dodecahedron, octahedron).
    #[arg(long, value_name = "TYPE")]
    pub boxtype: Option<String>,

    /// Salt concentration in mol/L on top of the neutralizing ions.
    #[arg(long, value_name = "MOL_PER_L")]
    pub concentration: Option<f64>,

    /// Water model whose equilibrated box fills the system (spc, tip4p, ...).
    #[arg(long, value_name = "MODEL")]
    pub water: Option<String>,

    /// make_ndx selection for the solute, e.g. '"Protein"' or 'r 1-100'.
    #[arg(long, value_name = "SELECTION")]
    pub main_selection: Option<String>,

    #[command(flatten)]
    pub stage: StageArgs,
}

/// Arguments for the `minimize` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct MinimizeArgs {
    /// Structure to minimize.
    #[arg(short = 'f', long, value_name = "PATH")]
    pub structure: Option<PathBuf>,

    /// System topology.
    #[arg(short = 'p', long, value_name = "PATH")]
    pub topology: Option<PathBuf>,

    /// mdp template: a file or a template name.
    #[arg(long, value_name = "TEMPLATE")]
    pub mdp: Option<String>,

    #[command(flatten)]
    pub stage: StageArgs,
}

/// Arguments for the `restrained` and `md` subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct MdArgs {
    /// Starting structure.
    #[arg(short = 'f', long, value_name = "PATH")]
    pub structure: Option<PathBuf>,

    /// System topology.
    #[arg(short = 'p', long, value_name = "PATH")]
    pub topology: Option<PathBuf>,

    /// Index file whose groups the main index starts from.
    #[arg(short = 'n', long, value_name = "PATH")]
    pub ndx: Option<PathBuf>,

    /// mdp template: a file or a template name.
    #[arg(long, value_name = "TEMPLATE")]
    pub mdp: Option<String>,

    /// Simulated time in ps.
    #[arg(long, value_name = "PS")]
    pub runtime: Option<f64>,

    /// Time step in ps.
    #[arg(long, value_name = "PS")]
    pub dt: Option<f64>,

    /// Default file name for the run (mdrun -deffnm).
    #[arg(long, value_name = "NAME")]
    pub deffnm: Option<String>,

    /// Queuing-system script template: a file or a template name.
    #[arg(long, value_name = "TEMPLATE")]
    pub job_template: Option<String>,

    /// Job name written into the script.
    #[arg(long, value_name = "NAME")]
    pub job_name: Option<String>,

    #[command(flatten)]
    pub stage: StageArgs,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Input protein structure. Without it, an existing topology in top/ is used.
    #[arg(short = 'f', long, value_name = "PATH")]
    pub structure: Option<PathBuf>,

    /// Salt concentration in mol/L on top of the neutralizing ions.
    #[arg(long, value_name = "MOL_PER_L")]
    pub concentration: Option<f64>,

    /// Also prepare the unrestrained MD run (needs MD_POSRES/md.gro).
    #[arg(long)]
    pub equilibrium: bool,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S restrained.runtime=500
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `templates` subcommand.
#[derive(Args, Debug)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    pub command: TemplatesCommands,
}

/// Available commands for template management.
#[derive(Subcommand, Debug)]
pub enum TemplatesCommands {
    /// List the built-in templates and those in the template directory.
    List,
    /// Print the template a name resolves to.
    Show {
        /// Template name or path.
        #[arg(required = true)]
        name: String,
    },
    /// Copy built-in templates into the template directory for editing.
    Export {
        /// Templates to export; all built-in templates if omitted.
        names: Vec<String>,
        /// Overwrite templates that already exist.
        #[arg(long)]
        force: bool,
    },
    /// Show the absolute path to the template directory.
    Path,
    /// Set a custom absolute path for the template directory.
    SetPath {
        /// The new template directory.
        #[arg(required = true)]
        path: PathBuf,
    },
    /// Reset the template directory to its default, OS-specific location.
    ResetPath,
}
