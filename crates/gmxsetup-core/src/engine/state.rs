use crate::core::mdp::MdpParams;
use crate::engine::error::SetupError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the stage output written into every stage directory.
pub const MANIFEST_NAME: &str = "outputs.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    /// A setting was changed automatically to something that works.
    AutoCorrection,
    /// A parameter value is probably wrong (e.g. a charged system).
    BadParameter,
    /// Input was used in a way the caller may not have intended.
    Usage,
    /// A non-essential tool call failed and the stage carried on.
    ToolFailure,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WarningKind::AutoCorrection => "auto-correction",
            WarningKind::BadParameter => "bad parameter",
            WarningKind::Usage => "usage",
            WarningKind::ToolFailure => "tool failure",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for SetupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// The files and scalars a stage hands on to the next one.
///
/// Paths are absolute. Fields a stage does not produce stay `None`, and the next stage
/// falls back to its own defaults for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StageOutput {
    pub stage: String,
    pub structure: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndx: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qtot: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_selection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpr: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_script: Option<PathBuf>,
    /// mdp overrides the caller supplied, passed on so a production run can reuse them.
    #[serde(default, skip_serializing_if = "MdpParams::is_empty")]
    pub mdp_overrides: MdpParams,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SetupWarning>,
}

impl StageOutput {
    pub fn new(stage: impl Into<String>, structure: impl Into<PathBuf>) -> Self {
        Self {
            stage: stage.into(),
            structure: structure.into(),
            topology: None,
            ndx: None,
            qtot: None,
            main_selection: None,
            tpr: None,
            job_script: None,
            mdp_overrides: MdpParams::new(),
            warnings: Vec::new(),
        }
    }

    /// Writes the output as [`MANIFEST_NAME`] into `dir` and returns the file path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, SetupError> {
        let path = dir.join(MANIFEST_NAME);
        let text = toml::to_string_pretty(self).map_err(|e| SetupError::Manifest {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&path, text).map_err(SetupError::io(&path))?;
        Ok(path)
    }

    /// Reads a stage output; `path` may be the manifest itself or its stage directory.
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let path = if path.is_dir() {
            path.join(MANIFEST_NAME)
        } else {
            path.to_path_buf()
        };
        let text = std::fs::read_to_string(&path).map_err(SetupError::io(&path))?;
        toml::from_str(&text).map_err(|e| SetupError::Manifest {
            path,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mdp::MdpValue;
    use tempfile::tempdir;

    #[test]
    fn manifest_survives_a_save_load_cycle_with_every_field() {
        let dir = tempdir().unwrap();
        let mut out = StageOutput::new("md_restrained", dir.path().join("md.gro"));
        out.topology = Some(PathBuf::from("/p/top/system.top"));
        out.ndx = Some(PathBuf::from("/p/MD_POSRES/md.ndx"));
        out.qtot = Some(-1.0);
        out.main_selection = Some("\"Protein\"".into());
        out.job_script = Some(PathBuf::from("/p/MD_POSRES/sge.sh"));
        out.mdp_overrides.set("nstxtcout", MdpValue::Int(250));
        out.warnings.push(SetupWarning {
            kind: WarningKind::AutoCorrection,
            message: "coupling everything to System".into(),
        });

        let path = out.save(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(MANIFEST_NAME));
        assert_eq!(StageOutput::load(dir.path()).unwrap(), out);
        assert_eq!(StageOutput::load(&path).unwrap(), out);
    }

    #[test]
    fn sparse_manifest_leaves_optional_fields_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hand-written.toml");
        std::fs::write(&path, "stage = \"topology\"\nstructure = \"/p/top/protein.pdb\"\n").unwrap();

        let out = StageOutput::load(&path).unwrap();
        assert_eq!(out.structure, PathBuf::from("/p/top/protein.pdb"));
        assert!(out.topology.is_none());
        assert!(out.mdp_overrides.is_empty());
    }

    #[test]
    fn malformed_manifest_is_reported() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_NAME), "structure = 3\n").unwrap();
        assert!(matches!(
            StageOutput::load(dir.path()),
            Err(SetupError::Manifest { .. })
        ));
    }

    #[test]
    fn warnings_render_with_their_kind() {
        let w = SetupWarning {
            kind: WarningKind::BadParameter,
            message: "qtot = 1".into(),
        };
        assert_eq!(w.to_string(), "[bad parameter] qtot = 1");
    }
}
