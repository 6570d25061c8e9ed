use super::file::{FileConfig, FileGromacsConfig};
use crate::cli::{GromacsArgs, MdArgs, MinimizeArgs, RunArgs, SolvateArgs, StageArgs, TopologyArgs};
use crate::error::{CliError, Result};
use gmxsetup::core::templates::TemplateStore;
use gmxsetup::core::tools::ToolArg;
use gmxsetup::core::tools::{Flavor, GromacsRunner};
use gmxsetup::engine::config::{MdConfig, MinimizeConfig, SolvateConfig, TopologyConfig};
use gmxsetup::engine::state::StageOutput;
use gmxsetup::workflows::pipeline::PipelineConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The command line wins over the configuration file.
pub fn build_runner(args: &GromacsArgs, file: Option<&FileGromacsConfig>) -> GromacsRunner {
    let file_flavor = file.and_then(|f| {
        f.legacy_suffix
            .clone()
            .map(|suffix| Flavor::Legacy { suffix })
            .or_else(|| f.driver.clone().map(|driver| Flavor::Unified { driver }))
    });
    let flavor = match (&args.legacy, &args.gmx) {
        (Some(suffix), _) => Flavor::Legacy {
            suffix: suffix.clone(),
        },
        (None, Some(driver)) => Flavor::Unified {
            driver: driver.clone(),
        },
        (None, None) => file_flavor.unwrap_or_default(),
    };
    debug!("Using GROMACS installation flavor {:?}", flavor);

    let mut runner = GromacsRunner::new(flavor);
    if let Some(file) = file {
        for (key, value) in &file.env {
            runner = runner.with_env(key, value);
        }
    }
    runner
}

/// Template lookup order: files relative to the project, `-T` directories, directories
/// from the configuration file, the user's template library, built-in templates.
pub fn build_templates(
    args: &GromacsArgs,
    file: Option<&FileGromacsConfig>,
    library: Option<&Path>,
) -> TemplateStore {
    let mut store = TemplateStore::new().with_base_dir(&args.root);
    for dir in &args.template_dirs {
        store = store.with_search_dir(dir);
    }
    for dir in file.map(|f| f.template_dirs.as_slice()).unwrap_or_default() {
        store = store.with_search_dir(args.root.join(dir));
    }
    if let Some(dir) = library.filter(|dir| dir.is_dir()) {
        store = store.with_search_dir(dir);
    }
    store
}

/// Loads the output of an earlier stage given with `--from`.
pub fn load_previous(stage: &StageArgs) -> Result<Option<StageOutput>> {
    let Some(path) = &stage.from else {
        return Ok(None);
    };
    let previous = StageOutput::load(path)?;
    info!(
        "Continuing from stage '{}' ({:?})",
        previous.stage, previous.structure
    );
    Ok(Some(previous))
}

pub fn build_topology(args: &TopologyArgs, file: &mut FileConfig) -> Result<TopologyConfig> {
    let mut config = TopologyConfig::new(PathBuf::new());
    if let Some(section) = file.topology.take() {
        section.apply_to(&mut config);
    }

    set(&mut config.structure, args.structure.clone());
    set(&mut config.protein, args.protein.clone());
    set(&mut config.top, args.top.clone());
    set(&mut config.dirname, args.stage.dirname.clone());
    for (key, value) in [("ff", &args.ff), ("water", &args.water)] {
        if let Some(value) = value {
            config.pdb2gmx_args.retain(|(k, _)| k != key);
            config
                .pdb2gmx_args
                .push((key.to_string(), ToolArg::from(value)));
        }
    }

    if config.structure.as_os_str().is_empty() {
        return Err(CliError::Argument(
            "No input structure: pass --structure or set topology.structure.".to_string(),
        ));
    }
    Ok(config)
}

pub fn build_solvate(
    args: &SolvateArgs,
    file: &mut FileConfig,
    previous: Option<&StageOutput>,
) -> SolvateConfig {
    let mut config = SolvateConfig::default();
    if let Some(previous) = previous {
        config.chain(previous);
    }
    if let Some(section) = file.solvate.take() {
        section.apply_to(&mut config);
    }

    set(&mut config.structure, args.structure.clone());
    set(&mut config.topology, args.topology.clone());
    set(&mut config.distance, args.distance);
    set(&mut config.boxtype, args.boxtype.clone());
    set(&mut config.concentration, args.concentration);
    set(&mut config.water, args.water.clone());
    set(&mut config.main_selection, args.main_selection.clone());
    set(&mut config.dirname, args.stage.dirname.clone());
    config
}

pub fn build_minimize(
    args: &MinimizeArgs,
    file: &mut FileConfig,
    previous: Option<&StageOutput>,
) -> MinimizeConfig {
    let mut config = MinimizeConfig::default();
    if let Some(previous) = previous {
        config.chain(previous);
    }
    if let Some(section) = file.minimize.take() {
        section.apply_to(&mut config);
    }

    set(&mut config.structure, args.structure.clone());
    set(&mut config.topology, args.topology.clone());
    set(&mut config.mdp, args.mdp.clone());
    set(&mut config.dirname, args.stage.dirname.clone());
    config
}

/// `equilibrium` selects the unrestrained defaults and the `[md]` table; otherwise the
/// position-restrained defaults and `[restrained]` are used.
pub fn build_md(
    args: &MdArgs,
    file: &mut FileConfig,
    previous: Option<&StageOutput>,
    equilibrium: bool,
) -> MdConfig {
    let (mut config, section) = if equilibrium {
        (MdConfig::equilibrium(), file.md.take())
    } else {
        (MdConfig::restrained(), file.restrained.take())
    };
    if let Some(previous) = previous {
        config.chain(previous);
    }
    if let Some(section) = section {
        section.apply_to(&mut config);
    }

    if args.structure.is_some() {
        config.structure = args.structure.clone();
    }
    set(&mut config.topology, args.topology.clone());
    if args.ndx.is_some() {
        config.ndx = args.ndx.clone();
    }
    set(&mut config.mdp, args.mdp.clone());
    set(&mut config.runtime, args.runtime);
    set(&mut config.dt, args.dt);
    set(&mut config.deffnm, args.deffnm.clone());
    set(&mut config.job_template, args.job_template.clone());
    if args.job_name.is_some() {
        config.job_name = args.job_name.clone();
    }
    set(&mut config.dirname, args.stage.dirname.clone());
    config
}

/// A topology stage is included when an input structure is known; the unrestrained MD
/// stage when asked for on the command line or configured in `[md]`.
pub fn build_pipeline(args: &RunArgs, mut file: FileConfig) -> Result<PipelineConfig> {
    let has_structure = args.structure.is_some()
        || file
            .topology
            .as_ref()
            .is_some_and(|t| t.structure.is_some());
    let topology = if has_structure {
        let topology_args = TopologyArgs {
            structure: args.structure.clone(),
            ..TopologyArgs::default()
        };
        Some(build_topology(&topology_args, &mut file)?)
    } else {
        None
    };

    let solvate_args = SolvateArgs {
        concentration: args.concentration,
        ..SolvateArgs::default()
    };
    let solvate = build_solvate(&solvate_args, &mut file, None);
    let minimize = build_minimize(&MinimizeArgs::default(), &mut file, None);
    let restrained = build_md(&MdArgs::default(), &mut file, None, false);
    let equilibrium = (args.equilibrium || file.md.is_some())
        .then(|| build_md(&MdArgs::default(), &mut file, None, true));

    Ok(PipelineConfig {
        topology,
        solvate,
        minimize,
        restrained,
        equilibrium,
    })
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use gmxsetup::core::mdp::MdpValue;
    use std::fs;
    use tempfile::tempdir;

    fn file_from(toml: &str) -> FileConfig {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gmxsetup.toml");
        fs::write(&path, toml).unwrap();
        FileConfig::load(Some(&path), &[]).unwrap()
    }

    #[test]
    fn legacy_flag_beats_configured_driver() {
        let file = FileGromacsConfig {
            driver: Some("gmx_mpi".to_string()),
            ..FileGromacsConfig::default()
        };

        let cli = Cli::parse_from(["gmxsetup", "--legacy=_mpi", "templates", "list"]);
        let runner = build_runner(&cli.gromacs, Some(&file));
        assert_eq!(
            runner.flavor(),
            &Flavor::Legacy {
                suffix: "_mpi".to_string()
            }
        );

        let cli = Cli::parse_from(["gmxsetup", "templates", "list"]);
        let runner = build_runner(&cli.gromacs, Some(&file));
        assert_eq!(
            runner.flavor(),
            &Flavor::Unified {
                driver: "gmx_mpi".to_string()
            }
        );
    }

    #[test]
    fn bare_legacy_flag_means_no_suffix() {
        let cli = Cli::parse_from(["gmxsetup", "--legacy", "templates", "list"]);
        let runner = build_runner(&cli.gromacs, None);
        assert_eq!(
            runner.flavor(),
            &Flavor::Legacy {
                suffix: String::new()
            }
        );
        let cli = Cli::parse_from(["gmxsetup", "templates", "list"]);
        assert_eq!(build_runner(&cli.gromacs, None).flavor(), &Flavor::default());
    }

    #[test]
    fn template_directories_are_searched_in_order() {
        let root = tempdir().unwrap();
        let library = tempdir().unwrap();
        let args = GromacsArgs {
            root: root.path().to_path_buf(),
            template_dirs: vec![PathBuf::from("/site/templates")],
            ..GromacsArgs::default()
        };
        let file = FileGromacsConfig {
            template_dirs: vec![PathBuf::from("templates")],
            ..FileGromacsConfig::default()
        };

        let store = build_templates(&args, Some(&file), Some(library.path()));
        assert_eq!(
            store.search_dirs(),
            &[
                PathBuf::from("/site/templates"),
                root.path().join("templates"),
                library.path().to_path_buf(),
            ]
        );

        let store = build_templates(&args, None, Some(&root.path().join("absent")));
        assert_eq!(store.search_dirs(), &[PathBuf::from("/site/templates")]);
    }

    #[test]
    fn cli_overrides_file_overrides_previous_stage() {
        let mut file = file_from(
            r#"
            [solvate]
            concentration = 0.1
            distance = 1.2
            "#,
        );
        let mut previous = StageOutput::new("topology", "/p/top/protein.pdb");
        previous.topology = Some(PathBuf::from("/p/top/system.top"));
        let args = SolvateArgs {
            concentration: Some(0.15),
            ..SolvateArgs::default()
        };

        let config = build_solvate(&args, &mut file, Some(&previous));

        assert_eq!(config.structure, PathBuf::from("/p/top/protein.pdb"));
        assert_eq!(config.topology, PathBuf::from("/p/top/system.top"));
        assert_eq!(config.distance, 1.2);
        assert_eq!(config.concentration, 0.15);
        assert_eq!(config.boxtype, "dodecahedron");
    }

    #[test]
    fn minimize_takes_charge_from_the_solvation_stage() {
        let mut previous = StageOutput::new("solvate", "/p/solvate/ionized.gro");
        previous.qtot = Some(-1.0);
        previous.main_selection = Some("r 1-100".to_string());

        let config = build_minimize(
            &MinimizeArgs::default(),
            &mut FileConfig::default(),
            Some(&previous),
        );

        assert_eq!(config.structure, PathBuf::from("/p/solvate/ionized.gro"));
        assert_eq!(config.qtot, -1.0);
        assert_eq!(config.main_selection, "r 1-100");
    }

    #[test]
    fn md_uses_its_own_section_and_defaults() {
        let mut file = file_from(
            r#"
            [restrained]
            runtime = 100
            [md]
            runtime = 5000
            job-name = "prod"
            "#,
        );
        let args = MdArgs {
            dt: Some(0.001),
            ..MdArgs::default()
        };

        let restrained = build_md(&args, &mut file, None, false);
        assert_eq!(restrained.dirname, "MD_POSRES");
        assert_eq!(restrained.runtime, 100.0);
        assert_eq!(restrained.dt, 0.001);
        assert_eq!(
            restrained.overrides.get("define"),
            Some(&MdpValue::Text("-DPOSRES".to_string()))
        );

        let md = build_md(&MdArgs::default(), &mut file, None, true);
        assert_eq!(md.dirname, "MD");
        assert_eq!(md.runtime, 5000.0);
        assert_eq!(md.job_name.as_deref(), Some("prod"));
        assert!(!md.overrides.contains("define"));
    }

    #[test]
    fn topology_needs_a_structure() {
        let result = build_topology(&TopologyArgs::default(), &mut FileConfig::default());
        assert!(matches!(result, Err(CliError::Argument(_))));

        let args = TopologyArgs {
            structure: Some(PathBuf::from("1abc.pdb")),
            ff: Some("amber99sb".to_string()),
            ..TopologyArgs::default()
        };
        let mut file = file_from("[topology.pdb2gmx]\nff = \"oplsaa\"\nignh = true\n");
        let config = build_topology(&args, &mut file).unwrap();
        assert_eq!(
            config.pdb2gmx_args,
            vec![
                ("ignh".to_string(), ToolArg::Flag(true)),
                ("ff".to_string(), ToolArg::from("amber99sb")),
            ]
        );
    }

    #[test]
    fn pipeline_stages_follow_arguments_and_file() {
        let args = RunArgs {
            concentration: Some(0.15),
            ..RunArgs::default()
        };
        let pipeline = build_pipeline(&args, FileConfig::default()).unwrap();
        assert!(pipeline.topology.is_none());
        assert!(pipeline.equilibrium.is_none());
        assert_eq!(pipeline.solvate.concentration, 0.15);

        let file = file_from("[topology]\nstructure = \"1abc.pdb\"\n[md]\nruntime = 200\n");
        let pipeline = build_pipeline(&RunArgs::default(), file).unwrap();
        assert_eq!(
            pipeline.topology.map(|t| t.structure),
            Some(PathBuf::from("1abc.pdb"))
        );
        assert_eq!(pipeline.equilibrium.map(|m| m.runtime), Some(200.0));
    }
}
