//! venv-bootstrap configuration: defaults, optional TOML file, CLI overrides.

use crate::error::{BootstrapError, Result};
use crate::interpreter::InterpreterVersion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Config file looked up in the working directory when none is given.
pub const CONFIG_FILE_NAME: &str = "venv-bootstrap.toml";

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "bootstrap.log";
const DEFAULT_CREATOR: &str = "virtualenv";

/// Contents of a config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub python: Option<InterpreterVersion>,
    pub env_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_file: Option<String>,
    pub creator: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl FileConfig {
    /// Load `explicit` (which must exist), or the default file if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(BootstrapError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => {
                let path = PathBuf::from(CONFIG_FILE_NAME);
                if !path.is_file() {
                    return Ok(Self::default());
                }
                path
            }
        };

        log::debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(&path)?;
        Self::parse(&content, &path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|source| BootstrapError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Values given on the command line; `None`/empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub python: Option<InterpreterVersion>,
    pub env_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_file: Option<String>,
    pub creator: Option<String>,
    pub requirements: Vec<String>,
}

/// Fully resolved settings for one bootstrap run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootstrapConfig {
    pub python: InterpreterVersion,
    pub env_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_file: String,
    pub creator: String,
    pub requirements: Vec<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self::resolve(FileConfig::default(), Overrides::default())
    }
}

impl BootstrapConfig {
    /// Merge defaults, file values and overrides (later wins).
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Self {
        let python = overrides.python.or(file.python).unwrap_or_default();
        let requirements = if overrides.requirements.is_empty() {
            file.requirements
        } else {
            overrides.requirements
        };

        Self {
            python,
            env_dir: overrides
                .env_dir
                .or(file.env_dir)
                .unwrap_or_else(|| PathBuf::from(python.env_dir_name())),
            log_dir: overrides
                .log_dir
                .or(file.log_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            log_file: overrides
                .log_file
                .or(file.log_file)
                .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
            creator: overrides
                .creator
                .or(file.creator)
                .unwrap_or_else(|| DEFAULT_CREATOR.to_string()),
            requirements,
        }
    }

    /// Load the config file and apply `overrides` on top.
    pub fn load(config_file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = FileConfig::load(config_file)?;
        let config = Self::resolve(file, overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let components: Vec<_> = Path::new(&self.log_file).components().collect();
        if !matches!(components.as_slice(), [Component::Normal(_)]) {
            return Err(BootstrapError::Config(format!(
                "log_file must be a plain file name, got '{}'",
                self.log_file
            )));
        }
        if self.creator.trim().is_empty() {
            return Err(BootstrapError::Config("creator must not be empty".into()));
        }
        Ok(())
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(&self.log_file)
    }

    /// Render as TOML, in the same shape a config file takes.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BootstrapError::Config(e.to_string()))
    }
}
