//! Installing requirements into the activated environment with pip.

use crate::activation::ActivatedEnvironment;
use crate::error::{BootstrapError, Result};
use crate::logfile::{LogMode, ToolLog};
use crate::platform::VenvLayout;
use crate::runner::{ToolInvocation, ToolKind, ToolRunner};
use std::ffi::OsString;

/// Environment variable naming the web proxy pip should use.
pub const PROXY_ENV_VAR: &str = "http_proxy";

/// Arguments for `python -m pip install`, with `--proxy` when one is set.
pub fn pip_args(requirements: &[String], proxy: Option<&str>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-m".into(), "pip".into(), "install".into()];
    if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
        args.push("--proxy".into());
        args.push(proxy.into());
    }
    args.extend(requirements.iter().map(OsString::from));
    args
}

/// Install `requirements` with the environment's own interpreter.
///
/// Does nothing when there is nothing to install. pip skips packages that are
/// already present, so repeated runs are cheap.
pub fn install_requirements(
    runner: &dyn ToolRunner,
    layout: &VenvLayout,
    env: &ActivatedEnvironment,
    log: &ToolLog,
    requirements: &[String],
    proxy: Option<&str>,
) -> Result<usize> {
    if requirements.is_empty() {
        return Ok(0);
    }

    log::info!("Installing {} requirement(s)", requirements.len());
    let invocation = ToolInvocation::new(ToolKind::Install, layout.python(), LogMode::Append)
        .args(pip_args(requirements, proxy))
        .with_env(env.clone());

    let status = runner.run(&invocation, log)?;
    if !status.success() {
        return Err(BootstrapError::InstallFailed {
            log: log.path().to_path_buf(),
            status: status.code(),
        });
    }

    Ok(requirements.len())
}
