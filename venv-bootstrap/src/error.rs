use std::path::PathBuf;
use thiserror::Error;

/// Failures of a bootstrap attempt.
///
/// The three tool failures display as the fixed console messages users see.
/// "Tool not found", "tool crashed" and "tool reported an error" are not
/// distinguished; `status` is the exit code when the tool ran at all.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Failed to create the virtual environment. See {} for details.", log.display())]
    CreationFailed { log: PathBuf, status: Option<i32> },

    #[error("Failed to activate the virtual environment. See {} for details.", log.display())]
    ActivationFailed { log: PathBuf, status: Option<i32> },

    #[error("Failed to install requirements. See {} for details.", log.display())]
    InstallFailed { log: PathBuf, status: Option<i32> },

    #[error("Could not create log directory {}: {source}", path.display())]
    LogDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BootstrapError {
    /// Exit status of the failed external tool, if it ran to completion.
    pub fn tool_status(&self) -> Option<i32> {
        match self {
            Self::CreationFailed { status, .. }
            | Self::ActivationFailed { status, .. }
            | Self::InstallFailed { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
