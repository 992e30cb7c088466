//! The tool log: one file capturing the output of every invoked tool.

use crate::error::{BootstrapError, Result};
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// How a tool invocation opens the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Truncate before writing. Used by environment creation.
    Overwrite,
    /// Append to what is already there.
    Append,
}

/// Handle to the log file inside an existing log directory.
#[derive(Debug, Clone)]
pub struct ToolLog {
    path: PathBuf,
}

impl ToolLog {
    /// Make sure `dir` exists and return a handle for `dir/file_name`.
    ///
    /// Fails fast if the directory cannot be created.
    pub fn acquire(dir: &Path, file_name: &str) -> Result<Self> {
        if !dir.is_dir() {
            log::info!("Creating log directory {}", dir.display());
            fs::create_dir_all(dir).map_err(|source| BootstrapError::LogDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        Ok(Self {
            path: dir.join(file_name),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the log file in the given mode.
    pub fn open(&self, mode: LogMode) -> Result<File> {
        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            LogMode::Overwrite => options.write(true).truncate(true),
            LogMode::Append => options.append(true),
        };

        options.open(&self.path).map_err(|source| BootstrapError::LogFile {
            path: self.path.clone(),
            source,
        })
    }

    /// Open the log, write a banner for `command_line`, and hand back the
    /// file as a child's stdout and stderr.
    pub fn capture(&self, mode: LogMode, command_line: &str) -> Result<(Stdio, Stdio)> {
        let mut file = self.open(mode)?;
        writeln!(
            file,
            "==> [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            command_line
        )?;

        let stderr = file.try_clone()?;
        Ok((Stdio::from(file), Stdio::from(stderr)))
    }

    /// Append a single line, e.g. a note that a tool could not be started.
    pub fn note(&self, line: &str) -> Result<()> {
        let mut file = self.open(LogMode::Append)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
