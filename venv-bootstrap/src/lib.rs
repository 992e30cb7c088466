//! Create (if missing) and activate a Python virtual environment.
//!
//! The environment is created with an external tool (`virtualenv` by default)
//! bound to a chosen interpreter major version, then activated with the
//! environment's own activation script. All tool output goes to one log file.
//! Activation yields an [`ActivatedEnvironment`] that callers apply to their
//! own process context.

pub mod activation;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod logfile;
pub mod packages;
pub mod platform;
pub mod runner;

pub use activation::{ActivatedEnvironment, EnvValue};
pub use bootstrap::{
    BootstrapReport, Bootstrapper, EVAL_SUCCESS_MESSAGE, Handoff, SHELL_SUCCESS_MESSAGE,
    SUCCESS_MESSAGE, Step,
};
pub use config::{BootstrapConfig, FileConfig, Overrides};
pub use error::{BootstrapError, Result};
pub use interpreter::InterpreterVersion;
pub use platform::{Os, VenvLayout};
pub use runner::{MockRunner, SystemRunner, ToolRunner};
