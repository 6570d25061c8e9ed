use crate::core::mdp::MdpParams;
use crate::core::tools::ToolArgs;
use crate::engine::state::StageOutput;
use std::path::PathBuf;
use thiserror::Error;

/// `make_ndx` selection for the solute when nothing else is configured.
pub const DEFAULT_MAIN_SELECTION: &str = "\"Protein\"";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyConfig {
    /// Input structure for `pdb2gmx`.
    pub structure: PathBuf,
    /// Base name of the processed structure (`<protein>.pdb`) and position restraints.
    pub protein: String,
    pub top: String,
    pub dirname: String,
    /// Extra `pdb2gmx` options such as `ff` and `water`.
    pub pdb2gmx_args: ToolArgs,
}

impl TopologyConfig {
    pub fn new(structure: impl Into<PathBuf>) -> Self {
        Self {
            structure: structure.into(),
            protein: "protein".to_string(),
            top: "system.top".to_string(),
            dirname: "top".to_string(),
            pdb2gmx_args: ToolArgs::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.structure.as_os_str().is_empty() {
            return Err(ConfigError::MissingParameter("structure"));
        }
        if self.protein.is_empty() {
            return Err(invalid("protein", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvateConfig {
    pub structure: PathBuf,
    pub topology: PathBuf,
    /// Minimum solute to box distance in nm.
    pub distance: f64,
    pub boxtype: String,
    /// Salt concentration in mol/L added on top of the neutralizing ions.
    pub concentration: f64,
    pub cation: String,
    pub anion: String,
    pub water: String,
    pub ndx: String,
    pub main_selection: String,
    pub dirname: String,
    pub maxwarn: u32,
}

impl Default for SolvateConfig {
    fn default() -> Self {
        Self {
            structure: PathBuf::from("top/protein.pdb"),
            topology: PathBuf::from("top/system.top"),
            distance: 0.9,
            boxtype: "dodecahedron".to_string(),
            concentration: 0.0,
            cation: "NA+".to_string(),
            anion: "CL-".to_string(),
            water: "spc".to_string(),
            ndx: "main.ndx".to_string(),
            main_selection: DEFAULT_MAIN_SELECTION.to_string(),
            dirname: "solvate".to_string(),
            maxwarn: 10,
        }
    }
}

impl SolvateConfig {
    /// Takes the structure and topology from the previous stage.
    pub fn chain(&mut self, prev: &StageOutput) {
        self.structure = prev.structure.clone();
        if let Some(topology) = &prev.topology {
            self.topology = topology.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.distance.is_nan() || self.distance <= 0.0 {
            return Err(invalid("distance", format!("must be positive, got {}", self.distance)));
        }
        if !self.concentration.is_finite() || self.concentration < 0.0 {
            return Err(invalid(
                "concentration",
                format!("must be a non-negative number, got {}", self.concentration),
            ));
        }
        if self.main_selection.trim().is_empty() {
            return Err(invalid("main_selection", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeConfig {
    pub dirname: String,
    pub mdp: String,
    pub structure: PathBuf,
    pub topology: PathBuf,
    pub main_selection: String,
    /// Total charge of the input system; anything but zero is reported.
    pub qtot: f64,
    pub overrides: MdpParams,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        Self {
            dirname: "em".to_string(),
            mdp: "em.mdp".to_string(),
            structure: PathBuf::from("solvate/ionized.gro"),
            topology: PathBuf::from("top/system.top"),
            main_selection: DEFAULT_MAIN_SELECTION.to_string(),
            qtot: 0.0,
            overrides: MdpParams::new(),
        }
    }
}

impl MinimizeConfig {
    /// Takes structure, topology, main selection and charge from the previous stage.
    /// The solvation index is not used for minimization.
    pub fn chain(&mut self, prev: &StageOutput) {
        self.structure = prev.structure.clone();
        if let Some(topology) = &prev.topology {
            self.topology = topology.clone();
        }
        if let Some(selection) = &prev.main_selection {
            self.main_selection = selection.clone();
        }
        if let Some(qtot) = prev.qtot {
            self.qtot = qtot;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.structure.as_os_str().is_empty() {
            return Err(ConfigError::MissingParameter("structure"));
        }
        if self.mdp.trim().is_empty() {
            return Err(invalid("mdp", "must not be empty"));
        }
        if self.dirname.trim().is_empty() {
            return Err(invalid("dirname", "must not be empty"));
        }
        if !self.qtot.is_finite() {
            return Err(invalid("qtot", format!("must be finite, got {}", self.qtot)));
        }
        Ok(())
    }
}

/// Settings for setting up an MD run: an mdp file, a run input file and a job script.
#[derive(Debug, Clone, PartialEq)]
pub struct MdConfig {
    pub dirname: String,
    pub deffnm: String,
    pub mdp: String,
    pub structure: Option<PathBuf>,
    pub topology: PathBuf,
    /// Index file whose groups the main index starts from.
    pub ndx: Option<PathBuf>,
    /// `None` leaves temperature coupling groups entirely to the mdp file and overrides.
    pub main_selection: Option<String>,
    pub job_template: String,
    pub job_name: Option<String>,
    /// Time step in ps.
    pub dt: f64,
    /// Simulated time in ps.
    pub runtime: f64,
    pub overrides: MdpParams,
}

impl Default for MdConfig {
    fn default() -> Self {
        Self::equilibrium()
    }
}

impl MdConfig {
    fn base(dirname: &str, structure: &str, job_name: &str) -> Self {
        Self {
            dirname: dirname.to_string(),
            deffnm: "md".to_string(),
            mdp: "md.mdp".to_string(),
            structure: Some(PathBuf::from(structure)),
            topology: PathBuf::from("top/system.top"),
            ndx: None,
            main_selection: Some(DEFAULT_MAIN_SELECTION.to_string()),
            job_template: "sge.sh".to_string(),
            job_name: Some(job_name.to_string()),
            dt: 0.002,
            runtime: 1000.0,
            overrides: MdpParams::new(),
        }
    }

    /// Position-restrained MD starting from the minimized structure.
    pub fn restrained() -> Self {
        let mut config = Self::base("MD_POSRES", "em/em.pdb", "PR_GMX");
        config.overrides.set("define", "-DPOSRES");
        config
    }

    /// Unrestrained MD starting from the last frame of the restrained run.
    pub fn equilibrium() -> Self {
        Self::base("MD", "MD_POSRES/md.gro", "MD_GMX")
    }

    /// Takes structure, topology and index from the previous stage.
    /// The previous main selection only replaces the default one; `None` or an explicit
    /// selection set here is kept. Carried mdp overrides only fill in keys not set here.
    pub fn chain(&mut self, prev: &StageOutput) {
        self.structure = Some(prev.structure.clone());
        if let Some(topology) = &prev.topology {
            self.topology = topology.clone();
        }
        if prev.ndx.is_some() {
            self.ndx = prev.ndx.clone();
        }
        let default_selection = self.main_selection.as_deref() == Some(DEFAULT_MAIN_SELECTION);
        if default_selection && prev.main_selection.is_some() {
            self.main_selection = prev.main_selection.clone();
        }
        self.overrides.merge_defaults(&prev.mdp_overrides);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.structure.is_none() {
            return Err(ConfigError::MissingParameter("structure"));
        }
        if self.deffnm.is_empty() {
            return Err(invalid("deffnm", "must not be empty"));
        }
        if self.dt.is_nan() || self.dt <= 0.0 {
            return Err(invalid("dt", format!("time step must be positive, got {}", self.dt)));
        }
        if !self.runtime.is_finite() || self.runtime < 0.0 {
            return Err(invalid(
                "runtime",
                format!("must be a non-negative number, got {}", self.runtime),
            ));
        }
        Ok(())
    }
}
