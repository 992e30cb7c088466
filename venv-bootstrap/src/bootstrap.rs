//! The bootstrap sequence: log directory, environment creation, activation.
//!
//! Steps run strictly in order and every failure is fatal:
//!
//! 1. make sure the log directory exists
//! 2. create the environment with the creation tool, unless its directory
//!    already exists (output overwrites the log)
//! 3. stop with [`BootstrapError::CreationFailed`] if creation failed
//! 4. run the activation script (output appended to the log)
//! 5. stop with [`BootstrapError::ActivationFailed`] if activation failed
//! 6. install configured requirements, if any
//!
//! Both exit statuses are always checked.

use crate::activation::{self, ActivatedEnvironment};
use crate::config::BootstrapConfig;
use crate::error::{BootstrapError, Result};
use crate::logfile::{LogMode, ToolLog};
use crate::packages;
use crate::platform::{Os, VenvLayout};
use crate::runner::{ToolInvocation, ToolKind, ToolRunner};
use std::fmt;
use std::path::PathBuf;

/// Printed after a successful run that only reports.
pub const SUCCESS_MESSAGE: &str = "Python environment configured. Enter it with \
'venv-bootstrap shell' (exit the shell to undo) or eval the output of \
'venv-bootstrap env' (run 'deactivate' to undo).";

/// Printed after `env`; the rendered script defines or restores `deactivate`.
pub const EVAL_SUCCESS_MESSAGE: &str =
    "Python environment configured. Run 'deactivate' to undo.";

/// Printed before handing over to an activated shell.
pub const SHELL_SUCCESS_MESSAGE: &str = "Python environment configured. Exit the shell to undo.";

/// How the activated environment is handed to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Nothing is applied; the user is told how to enter the environment.
    Report,
    /// Shell statements are printed for `eval`.
    Eval,
    /// An interactive shell is started inside the environment.
    Shell,
}

impl Handoff {
    pub fn success_message(&self) -> &'static str {
        match self {
            Handoff::Report => SUCCESS_MESSAGE,
            Handoff::Eval => EVAL_SUCCESS_MESSAGE,
            Handoff::Shell => SHELL_SUCCESS_MESSAGE,
        }
    }
}

/// One step a run would take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    CreateLogDirectory(PathBuf),
    CreateEnvironment(String),
    ReuseEnvironment(PathBuf),
    Activate(PathBuf),
    InstallRequirements(Vec<String>),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::CreateLogDirectory(dir) => write!(f, "create log directory {}", dir.display()),
            Step::CreateEnvironment(command) => write!(f, "create environment: {}", command),
            Step::ReuseEnvironment(dir) => write!(f, "reuse existing environment {}", dir.display()),
            Step::Activate(script) => write!(f, "activate via {}", script.display()),
            Step::InstallRequirements(reqs) => write!(f, "install {}", reqs.join(" ")),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    /// Whether the environment was created during this run.
    pub created: bool,
    pub environment: ActivatedEnvironment,
    pub installed: usize,
    pub log_file: PathBuf,
}

/// Creates (if needed) and activates one virtual environment.
pub struct Bootstrapper<'a> {
    config: &'a BootstrapConfig,
    layout: VenvLayout,
    runner: &'a dyn ToolRunner,
    proxy: Option<String>,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(config: &'a BootstrapConfig, os: Os, runner: &'a dyn ToolRunner) -> Self {
        Self {
            config,
            layout: VenvLayout::new(&config.env_dir, os),
            runner,
            proxy: None,
        }
    }

    /// Proxy handed to pip when installing requirements.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn layout(&self) -> &VenvLayout {
        &self.layout
    }

    /// The creation command for this environment.
    pub fn creation_invocation(&self) -> ToolInvocation {
        ToolInvocation::new(ToolKind::Create, &self.config.creator, LogMode::Overwrite)
            .args(self.config.python.selector_args())
            .arg(self.layout.root())
    }

    /// Steps a run would take right now, without doing anything.
    pub fn plan(&self) -> Vec<Step> {
        let mut steps = Vec::new();

        if !self.config.log_dir.is_dir() {
            steps.push(Step::CreateLogDirectory(self.config.log_dir.clone()));
        }

        if self.layout.exists() {
            steps.push(Step::ReuseEnvironment(self.layout.root().to_path_buf()));
        } else {
            steps.push(Step::CreateEnvironment(
                self.creation_invocation().command_line(),
            ));
        }

        steps.push(Step::Activate(self.layout.activate_script()));

        if !self.config.requirements.is_empty() {
            steps.push(Step::InstallRequirements(self.config.requirements.clone()));
        }

        steps
    }

    /// Run the whole sequence.
    pub fn run(&self) -> Result<BootstrapReport> {
        let log = ToolLog::acquire(&self.config.log_dir, &self.config.log_file)?;

        let created = self.ensure_environment(&log)?;
        let environment = activation::activate(self.runner, &self.layout, &log)?;
        let installed = packages::install_requirements(
            self.runner,
            &self.layout,
            &environment,
            &log,
            &self.config.requirements,
            self.proxy.as_deref(),
        )?;

        Ok(BootstrapReport {
            created,
            environment,
            installed,
            log_file: log.path().to_path_buf(),
        })
    }

    /// Create the environment unless its directory exists.
    ///
    /// Returns whether creation ran.
    fn ensure_environment(&self, log: &ToolLog) -> Result<bool> {
        if self.layout.exists() {
            log::info!(
                "Environment {} already exists, skipping creation",
                self.layout.root().display()
            );
            return Ok(false);
        }

        log::info!(
            "Creating {} environment in {}",
            self.config.python,
            self.layout.root().display()
        );
        let status = self.runner.run(&self.creation_invocation(), log)?;
        if !status.success() {
            return Err(BootstrapError::CreationFailed {
                log: log.path().to_path_buf(),
                status: status.code(),
            });
        }

        Ok(true)
    }
}
