//! Running external tools with their output captured in the tool log.

pub mod mock;

pub use mock::MockRunner;

use crate::activation::ActivatedEnvironment;
use crate::error::Result;
use crate::logfile::{LogMode, ToolLog};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Which bootstrap step an invocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Create,
    Activate,
    Install,
}

/// A single external command to run.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub kind: ToolKind,
    pub program: OsString,
    pub args: Vec<OsString>,
    pub log_mode: LogMode,
    /// Environment to run the tool under, if it differs from ours.
    pub env: Option<ActivatedEnvironment>,
}

impl ToolInvocation {
    pub fn new(kind: ToolKind, program: impl Into<OsString>, log_mode: LogMode) -> Self {
        Self {
            kind,
            program: program.into(),
            args: Vec::new(),
            log_mode,
            env: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, env: ActivatedEnvironment) -> Self {
        self.env = Some(env);
        self
    }

    /// Printable command line for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How an external tool finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    /// Ran to completion with this exit code.
    Exited(i32),
    /// Killed by a signal.
    Terminated,
    /// Could not be found or spawned.
    NotStarted,
}

impl ToolStatus {
    pub fn success(&self) -> bool {
        matches!(self, ToolStatus::Exited(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ToolStatus::Exited(code) => Some(*code),
            _ => None,
        }
    }
}

/// Trait for running the external tools the bootstrap depends on.
pub trait ToolRunner {
    /// Run the tool to completion, sending stdout and stderr to `log`.
    ///
    /// A tool that cannot be started is reported as [`ToolStatus::NotStarted`];
    /// `Err` is reserved for failures of the log itself.
    fn run(&self, invocation: &ToolInvocation, log: &ToolLog) -> Result<ToolStatus>;

    /// Runner name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Runs tools as real child processes, one at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation, log: &ToolLog) -> Result<ToolStatus> {
        let command_line = invocation.command_line();
        log::debug!("Running: {}", command_line);

        let (stdout, stderr) = log.capture(invocation.log_mode, &command_line)?;

        let Some(program) = resolve_program(&invocation.program) else {
            log::warn!("{} not found in PATH", invocation.program.to_string_lossy());
            log.note(&format!(
                "error: {} not found in PATH",
                invocation.program.to_string_lossy()
            ))?;
            return Ok(ToolStatus::NotStarted);
        };

        let mut command = Command::new(&program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);

        if let Some(env) = &invocation.env {
            env.apply(&mut command);
        }

        match command.status() {
            Ok(status) => {
                let status = status.code().map_or(ToolStatus::Terminated, ToolStatus::Exited);
                log::debug!("{} finished: {:?}", command_line, status);
                Ok(status)
            }
            Err(e) => {
                log::warn!("Failed to start {}: {}", program.display(), e);
                log.note(&format!("error: failed to start {}: {}", program.display(), e))?;
                Ok(ToolStatus::NotStarted)
            }
        }
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

/// Look bare program names up in PATH; paths are used as given.
fn resolve_program(program: &OsStr) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return Some(path.to_path_buf());
    }
    which::which(program).ok()
}
