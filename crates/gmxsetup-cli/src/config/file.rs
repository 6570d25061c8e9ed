use crate::error::{CliError, Result};
use crate::utils::parser::{self, Setting};
use gmxsetup::core::mdp::{MdpParams, MdpValue};
use gmxsetup::core::tools::ToolArgs;
use gmxsetup::engine::config as core_config;
use serde::{Deserialize, Deserializer, de};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The configuration file, one optional table per stage plus `[gromacs]`.
///
/// Every field is optional; what is missing keeps the stage defaults.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub gromacs: Option<FileGromacsConfig>,
    pub topology: Option<FileTopologyConfig>,
    pub solvate: Option<FileSolvateConfig>,
    pub minimize: Option<FileMinimizeConfig>,
    pub restrained: Option<FileMdConfig>,
    pub md: Option<FileMdConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileGromacsConfig {
    pub driver: Option<String>,
    pub legacy_suffix: Option<String>,
    #[serde(default)]
    pub template_dirs: Vec<PathBuf>,
    /// Environment for every GROMACS process, e.g. `GMX_MAXBACKUP = -1`. Numbers and
    /// booleans are taken as their text.
    #[serde(default, deserialize_with = "env_values")]
    pub env: BTreeMap<String, String>,
}

fn env_values<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, toml::Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(name, value)| {
            let text = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => {
                    return Err(de::Error::custom(format!(
                        "environment variable '{}' must be a string, number or boolean, not {}",
                        name,
                        other.type_str()
                    )));
                }
            };
            Ok((name, text))
        })
        .collect()
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileTopologyConfig {
    pub structure: Option<PathBuf>,
    pub protein: Option<String>,
    pub top: Option<String>,
    pub dirname: Option<String>,
    /// Extra pdb2gmx options; booleans become `-opt`/`-noopt`.
    #[serde(default)]
    pub pdb2gmx: BTreeMap<String, MdpValue>,
}

impl FileTopologyConfig {
    pub fn apply_to(self, config: &mut core_config::TopologyConfig) {
        set(&mut config.structure, self.structure);
        set(&mut config.protein, self.protein);
        set(&mut config.top, self.top);
        set(&mut config.dirname, self.dirname);
        let extra: ToolArgs = self
            .pdb2gmx
            .iter()
            .map(|(key, value)| (key.clone(), value.to_tool_arg()))
            .collect();
        config.pdb2gmx_args.extend(extra);
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSolvateConfig {
    pub structure: Option<PathBuf>,
    pub topology: Option<PathBuf>,
    pub distance: Option<f64>,
    pub boxtype: Option<String>,
    pub concentration: Option<f64>,
    pub cation: Option<String>,
    pub anion: Option<String>,
    pub water: Option<String>,
    pub ndx: Option<String>,
    pub main_selection: Option<String>,
    pub dirname: Option<String>,
    pub maxwarn: Option<u32>,
}

impl FileSolvateConfig {
    pub fn apply_to(self, config: &mut core_config::SolvateConfig) {
        set(&mut config.structure, self.structure);
        set(&mut config.topology, self.topology);
        set(&mut config.distance, self.distance);
        set(&mut config.boxtype, self.boxtype);
        set(&mut config.concentration, self.concentration);
        set(&mut config.cation, self.cation);
        set(&mut config.anion, self.anion);
        set(&mut config.water, self.water);
        set(&mut config.ndx, self.ndx);
        set(&mut config.main_selection, self.main_selection);
        set(&mut config.dirname, self.dirname);
        set(&mut config.maxwarn, self.maxwarn);
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileMinimizeConfig {
    pub structure: Option<PathBuf>,
    pub topology: Option<PathBuf>,
    pub mdp: Option<String>,
    pub main_selection: Option<String>,
    pub qtot: Option<f64>,
    pub dirname: Option<String>,
    /// mdp parameters; keys the template lacks are passed to grompp as options.
    #[serde(default)]
    pub overrides: MdpParams,
}

impl FileMinimizeConfig {
    pub fn apply_to(self, config: &mut core_config::MinimizeConfig) {
        set(&mut config.structure, self.structure);
        set(&mut config.topology, self.topology);
        set(&mut config.mdp, self.mdp);
        set(&mut config.main_selection, self.main_selection);
        set(&mut config.qtot, self.qtot);
        set(&mut config.dirname, self.dirname);
        config.overrides.extend(self.overrides);
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileMdConfig {
    pub structure: Option<PathBuf>,
    pub topology: Option<PathBuf>,
    pub ndx: Option<PathBuf>,
    pub mdp: Option<String>,
    pub main_selection: Option<String>,
    /// Leave temperature coupling groups to the mdp file.
    #[serde(default)]
    pub no_main_selection: bool,
    pub deffnm: Option<String>,
    pub job_template: Option<String>,
    pub job_name: Option<String>,
    pub dt: Option<f64>,
    pub runtime: Option<f64>,
    pub dirname: Option<String>,
    #[serde(default)]
    pub overrides: MdpParams,
}

impl FileMdConfig {
    pub fn apply_to(self, config: &mut core_config::MdConfig) {
        if self.structure.is_some() {
            config.structure = self.structure;
        }
        set(&mut config.topology, self.topology);
        if self.ndx.is_some() {
            config.ndx = self.ndx;
        }
        set(&mut config.mdp, self.mdp);
        if self.no_main_selection {
            config.main_selection = None;
        } else if self.main_selection.is_some() {
            config.main_selection = self.main_selection;
        }
        set(&mut config.deffnm, self.deffnm);
        set(&mut config.job_template, self.job_template);
        if self.job_name.is_some() {
            config.job_name = self.job_name;
        }
        set(&mut config.dt, self.dt);
        set(&mut config.runtime, self.runtime);
        set(&mut config.dirname, self.dirname);
        config.overrides.extend(self.overrides);
    }
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

impl FileConfig {
    /// Reads the configuration file (if any) and applies `--set` overrides on top of it.
    pub fn load(path: Option<&Path>, set_values: &[String]) -> Result<Self> {
        let mut table = match path {
            Some(path) => Self::read_table(path)?,
            None => toml::Table::new(),
        };

        for setting in set_values {
            let setting = parser::parse_setting(setting)?;
            debug!("Applying --set {:?}", setting);
            insert_setting(&mut table, setting)?;
        }

        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| CliError::Config(e.to_string().trim().to_string()))
    }

    fn read_table(path: &Path) -> Result<toml::Table> {
        debug!("Reading configuration file from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

fn insert_setting(table: &mut toml::Table, setting: Setting) -> Result<()> {
    let Setting { path, value } = setting;
    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };

    let mut current = table;
    for key in parents {
        let entry = current
            .entry(key.clone())
            .or_insert(toml::Value::Table(toml::Table::new()));
        current = entry.as_table_mut().ok_or_else(|| {
            CliError::Config(format!(
                "Cannot set '{}': '{}' is not a table.",
                path.join("."),
                key
            ))
        })?;
    }
    current.insert(last.clone(), value);
    Ok(())
}
