use crate::error::{CliError, Result};
use directories::ProjectDirs;
use gmxsetup::core::templates::TemplateStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The user's template directory.
///
/// Files placed here shadow the built-in templates of the same name and can be referred
/// to by name from any project. The location defaults to an OS-specific data directory
/// and can be redirected with `gmxsetup templates set-path`.
#[derive(Debug)]
pub struct TemplateLibrary {
    base_path: PathBuf,
}

impl TemplateLibrary {
    pub fn new() -> Result<Self> {
        let path = Self::determine_template_path()?;
        debug!("TemplateLibrary initialized with path: {:?}", &path);
        Ok(Self { base_path: path })
    }

    #[cfg(test)]
    pub fn with_custom_path(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// Names of the template files present in the library, sorted.
    pub fn user_templates(&self) -> Result<Vec<String>> {
        if !self.base_path.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Writes built-in templates into the library so they can be customized.
    ///
    /// Existing files are only replaced with `force`. Returns the written paths.
    pub fn export_builtins(&self, names: &[&str], force: bool) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.base_path)?;
        let mut written = Vec::new();
        for &name in names {
            let content = TemplateStore::builtin(name).ok_or_else(|| {
                CliError::Templates(format!(
                    "'{}' is not a built-in template (available: {})",
                    name,
                    TemplateStore::builtin_names().join(", ")
                ))
            })?;
            let target = self.base_path.join(name);
            if target.exists() && !force {
                warn!("{:?} exists, not overwriting (use --force).", target);
                continue;
            }
            fs::write(&target, content)?;
            info!("Exported template '{}' to {:?}", name, target);
            written.push(target);
        }
        Ok(written)
    }

    pub fn set_custom_path(path: &Path) -> Result<()> {
        let path = path.to_str().ok_or_else(|| {
            CliError::Argument(format!("Template path {:?} is not valid UTF-8.", path))
        })?;
        let config_path = Self::get_path_config_file()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(config_path, path).map_err(CliError::from)
    }

    pub fn reset_path() -> Result<()> {
        if let Ok(config_path) = Self::get_path_config_file() {
            if config_path.exists() {
                fs::remove_file(config_path)?;
            }
        }
        Ok(())
    }

    fn determine_template_path() -> Result<PathBuf> {
        match Self::get_path_config_file() {
            Ok(config_path) if config_path.exists() => {
                let custom_path_str = fs::read_to_string(&config_path)?.trim().to_string();
                if custom_path_str.is_empty() {
                    warn!("Custom path config file is empty, falling back to default path.");
                    Self::get_default_template_path()
                } else {
                    Ok(PathBuf::from(custom_path_str))
                }
            }
            _ => Self::get_default_template_path(),
        }
    }

    fn get_path_config_file() -> Result<PathBuf> {
        ProjectDirs::from("org", "gmxsetup", "gmxsetup")
            .map(|dirs| dirs.config_dir().join("templates-path.conf"))
            .ok_or_else(|| {
                CliError::Templates("Could not determine config directory path.".to_string())
            })
    }

    fn get_default_template_path() -> Result<PathBuf> {
        ProjectDirs::from("org", "gmxsetup", "gmxsetup")
            .map(|dirs| dirs.data_dir().join("templates"))
            .ok_or_else(|| {
                CliError::Templates("Could not determine default data directory path.".to_string())
            })
    }
}
