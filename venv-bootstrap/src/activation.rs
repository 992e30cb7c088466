//! Activation of a virtual environment.
//!
//! A child process cannot change its parent's environment, so activation runs
//! the environment's own activation script (for its checks and its log
//! output) and then returns the variables that script would have set as an
//! [`ActivatedEnvironment`]. Callers apply that mapping to their own context:
//! a child [`Command`], an interactive shell, or `eval`able shell text.

use crate::error::{BootstrapError, Result};
use crate::logfile::{LogMode, ToolLog};
use crate::platform::{Os, VenvLayout};
use crate::runner::{ToolInvocation, ToolKind, ToolRunner};
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Command;

/// New value for one environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Set(OsString),
    Unset,
}

/// Variables to change in order to be "inside" a virtual environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatedEnvironment {
    os: Os,
    name: String,
    root: PathBuf,
    scripts: PathBuf,
    vars: Vec<(String, EnvValue)>,
}

impl ActivatedEnvironment {
    /// Compute the mapping for `layout`, reading current values via `current`.
    pub fn compute<F>(layout: &VenvLayout, current: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let os = layout.os();
        let root = absolute(layout.root())?;
        let scripts = root.join(os.scripts_dir_name());

        let mut entries = vec![scripts.clone()];
        if let Some(existing) = current("PATH").filter(|p| !p.is_empty()) {
            entries.extend(std::env::split_paths(&existing));
        }
        let path = std::env::join_paths(entries)
            .map_err(|e| BootstrapError::Config(format!("Cannot extend PATH: {}", e)))?;

        let mut prompt = OsString::from(format!("({}) ", layout.name()));
        prompt.push(
            current(os.prompt_var())
                .unwrap_or_else(|| OsString::from(os.default_prompt())),
        );

        let vars = vec![
            ("VIRTUAL_ENV".to_string(), EnvValue::Set(root.clone().into_os_string())),
            ("PATH".to_string(), EnvValue::Set(path)),
            ("PYTHONHOME".to_string(), EnvValue::Unset),
            (os.prompt_var().to_string(), EnvValue::Set(prompt)),
        ];

        Ok(Self {
            os,
            name: layout.name(),
            root,
            scripts,
            vars,
        })
    }

    /// Compute the mapping against this process's environment.
    pub fn from_process(layout: &VenvLayout) -> Result<Self> {
        Self::compute(layout, |name| std::env::var_os(name))
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn get(&self, name: &str) -> Option<&EnvValue> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply the mapping to a command about to be spawned.
    pub fn apply(&self, command: &mut Command) {
        for (name, value) in self.iter() {
            match value {
                EnvValue::Set(v) => {
                    command.env(name, v);
                }
                EnvValue::Unset => {
                    command.env_remove(name);
                }
            }
        }
    }

    /// Render as a script for the platform's shell.
    ///
    /// The script extends the shell's own `PATH` and prompt at evaluation
    /// time and saves the previous values under the names virtualenv uses
    /// (`_OLD_VIRTUAL_*`), so `deactivate` undoes it. On Unix it defines
    /// `deactivate` itself and is meant for `eval "$(venv-bootstrap env)"`; on
    /// Windows the environment's own `deactivate.bat` restores the saved values.
    pub fn render(&self) -> String {
        if self.os.is_windows() {
            self.render_cmd()
        } else {
            self.render_sh()
        }
    }

    fn render_sh(&self) -> String {
        let root = sh_quote(self.root.as_os_str());
        let scripts = sh_quote(self.scripts.as_os_str());
        let prefix = sh_quote(OsStr::new(&format!("({}) ", self.name)));

        format!(
            r#"if command -v deactivate >/dev/null 2>&1; then deactivate; fi
unset _OLD_VIRTUAL_PYTHONHOME
_OLD_VIRTUAL_PATH="${{PATH-}}"
if [ -n "${{PYTHONHOME+x}}" ]; then _OLD_VIRTUAL_PYTHONHOME="$PYTHONHOME"; fi
_OLD_VIRTUAL_PS1="${{PS1-}}"
deactivate () {{
    PATH="$_OLD_VIRTUAL_PATH"; export PATH
    if [ -n "${{_OLD_VIRTUAL_PYTHONHOME+x}}" ]; then PYTHONHOME="$_OLD_VIRTUAL_PYTHONHOME"; export PYTHONHOME; fi
    PS1="$_OLD_VIRTUAL_PS1"
    unset VIRTUAL_ENV _OLD_VIRTUAL_PATH _OLD_VIRTUAL_PYTHONHOME _OLD_VIRTUAL_PS1
    unset -f deactivate
    hash -r 2>/dev/null
}}
export VIRTUAL_ENV={root}
PATH={scripts}"${{PATH:+:$PATH}}"; export PATH
unset PYTHONHOME
PS1={prefix}"${{PS1-}}"
hash -r 2>/dev/null
"#
        )
    }

    fn render_cmd(&self) -> String {
        let root = self.root.to_string_lossy();
        let scripts = self.scripts.to_string_lossy();
        let name = &self.name;

        format!(
            r#"if not defined PROMPT set "PROMPT=$P$G"
set "_OLD_VIRTUAL_PROMPT=%PROMPT%"
set "_OLD_VIRTUAL_PATH=%PATH%"
set "_OLD_VIRTUAL_PYTHONHOME="
if defined PYTHONHOME set "_OLD_VIRTUAL_PYTHONHOME=%PYTHONHOME%"
set "VIRTUAL_ENV={root}"
set "PATH={scripts};%PATH%"
set PYTHONHOME=
set "PROMPT=({name}) %PROMPT%"
"#
        )
    }
}

/// Run the activation script of `layout` and compute the resulting mapping.
///
/// The script's output is appended to the tool log. A script that is missing,
/// cannot be run, or exits non-zero is an [`BootstrapError::ActivationFailed`].
pub fn activate(
    runner: &dyn ToolRunner,
    layout: &VenvLayout,
    log: &ToolLog,
) -> Result<ActivatedEnvironment> {
    let script = layout.activate_script();
    let (program, args) = layout.os().activation_command(&script);
    let invocation = ToolInvocation::new(ToolKind::Activate, program, LogMode::Append).args(args);

    log::info!("Activating {}", layout.root().display());
    let status = runner.run(&invocation, log)?;
    if !status.success() {
        log::debug!("Activation via {} failed: {:?}", runner.name(), status);
        return Err(BootstrapError::ActivationFailed {
            log: log.path().to_path_buf(),
            status: status.code(),
        });
    }

    ActivatedEnvironment::from_process(layout)
}

fn absolute(path: &std::path::Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

/// Single-quote for POSIX shells.
fn sh_quote(value: &OsStr) -> String {
    format!("'{}'", value.to_string_lossy().replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{MockRunner, ToolStatus};
    use proptest::prelude::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<OsString> + 'a {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| OsString::from(v))
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_compute_unix() {
        let layout = VenvLayout::new("/work/py3", Os::Linux);
        let env = ActivatedEnvironment::compute(
            &layout,
            lookup(&[("PATH", "/usr/bin:/bin"), ("PS1", "$ ")]),
        )
        .unwrap();

        assert_eq!(
            env.get("VIRTUAL_ENV"),
            Some(&EnvValue::Set("/work/py3".into()))
        );
        assert_eq!(
            env.get("PATH"),
            Some(&EnvValue::Set("/work/py3/bin:/usr/bin:/bin".into()))
        );
        assert_eq!(env.get("PYTHONHOME"), Some(&EnvValue::Unset));
        assert_eq!(env.get("PS1"), Some(&EnvValue::Set("(py3) $ ".into())));
    }

    #[cfg(unix)]
    #[test]
    fn test_compute_without_existing_path() {
        let layout = VenvLayout::new("/work/py2", Os::Linux);
        let env = ActivatedEnvironment::compute(&layout, lookup(&[])).unwrap();

        assert_eq!(env.get("PATH"), Some(&EnvValue::Set("/work/py2/bin".into())));
        assert_eq!(env.root(), std::path::Path::new("/work/py2"));
    }

    #[test]
    fn test_iter_in_order() {
        let layout = VenvLayout::new("py3", Os::Linux);
        let env = ActivatedEnvironment::compute(&layout, lookup(&[])).unwrap();
        let names: Vec<_> = env.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["VIRTUAL_ENV", "PATH", "PYTHONHOME", "PS1"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_render_unix_keeps_shell_prompt() {
        // PS1 is a shell variable, not exported, so this process never sees it
        let layout = VenvLayout::new("/work/py3", Os::Linux);
        let env = ActivatedEnvironment::compute(&layout, lookup(&[("PATH", "/bin")])).unwrap();
        let rendered = env.render();

        assert!(rendered.contains("export VIRTUAL_ENV='/work/py3'\n"));
        assert!(rendered.contains("PATH='/work/py3/bin'\"${PATH:+:$PATH}\"; export PATH\n"));
        assert!(rendered.contains("PS1='(py3) '\"${PS1-}\"\n"));
        assert!(rendered.contains("unset PYTHONHOME\n"));
        assert!(rendered.contains("deactivate () {"));
        assert!(!rendered.contains("export PS1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_render_unix_quotes_values() {
        let layout = VenvLayout::new("/work/it's", Os::Linux);
        let env = ActivatedEnvironment::compute(&layout, lookup(&[])).unwrap();
        let rendered = env.render();

        assert!(rendered.contains(r"export VIRTUAL_ENV='/work/it'\''s'"));
        assert!(rendered.contains(r"PS1='(it'\''s) '"));
    }

    #[cfg(unix)]
    #[test]
    fn test_rendered_script_activates_and_deactivates() {
        let layout = VenvLayout::new("/work/py3", Os::Linux);
        let env = ActivatedEnvironment::compute(&layout, lookup(&[])).unwrap();
        let script = r#"PS1='$ '
PYTHONHOME=/opt/python; export PYTHONHOME
eval "$1"
printf '%s|%s|%s|%s\n' "$PS1" "$PATH" "${VIRTUAL_ENV-none}" "${PYTHONHOME-none}"
deactivate
printf '%s|%s|%s|%s\n' "$PS1" "$PATH" "${VIRTUAL_ENV-none}" "${PYTHONHOME-none}"
command -v deactivate >/dev/null || echo gone
"#;

        let output = Command::new("sh")
            .args(["-c", script, "sh"])
            .arg(env.render())
            .env("PATH", "/usr/bin:/bin")
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        let lines: Vec<_> = stdout.lines().collect();
        assert_eq!(lines[0], "(py3) $ |/work/py3/bin:/usr/bin:/bin|/work/py3|none");
        assert_eq!(lines[1], "$ |/usr/bin:/bin|none|/opt/python");
        assert_eq!(lines[2], "gone");
    }

    #[test]
    fn test_render_windows_saves_values_for_deactivate() {
        let layout = VenvLayout::new("py3", Os::Windows);
        let env = ActivatedEnvironment::compute(&layout, lookup(&[])).unwrap();
        let rendered = env.render();

        assert!(rendered.contains("set \"_OLD_VIRTUAL_PATH=%PATH%\"\n"));
        assert!(rendered.contains("set \"_OLD_VIRTUAL_PROMPT=%PROMPT%\"\n"));
        assert!(rendered.contains("set PYTHONHOME=\n"));
        assert!(rendered.contains("set \"PROMPT=(py3) %PROMPT%\"\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_activation_passes_virtualenv_source_guard() {
        use crate::runner::SystemRunner;

        let temp = tempfile::tempdir().unwrap();
        let log = ToolLog::acquire(temp.path(), "bootstrap.log").unwrap();
        let layout = VenvLayout::new(temp.path().join("py3"), Os::Linux);
        std::fs::create_dir_all(layout.scripts_dir()).unwrap();
        std::fs::write(
            layout.activate_script(),
            "if [ \"${BASH_SOURCE-}\" = \"$0\" ]; then\n\
             \x20   echo \"You must source this script: \\$ source $0\" >&2\n\
             \x20   exit 33\n\
             fi\n\
             echo sourced\n",
        )
        .unwrap();

        // Through the default sh
        activate(&SystemRunner, &layout, &log).unwrap();

        // And through bash, which sets BASH_SOURCE
        if let Ok(bash) = which::which("bash") {
            let (_, args) = Os::Linux.activation_command(&layout.activate_script());
            let invocation =
                ToolInvocation::new(ToolKind::Activate, bash, LogMode::Append).args(args);
            assert_eq!(
                SystemRunner.run(&invocation, &log).unwrap(),
                ToolStatus::Exited(0)
            );
        }

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(!content.contains("You must source"));
        assert!(content.contains("sourced"));
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_to_command() {
        let layout = VenvLayout::new("/work/py3", Os::Linux);
        let env = ActivatedEnvironment::compute(&layout, lookup(&[("PATH", "/bin")])).unwrap();
        let mut command = Command::new("true");
        env.apply(&mut command);

        let envs: Vec<_> = command.get_envs().collect();
        assert!(envs.contains(&(OsStr::new("VIRTUAL_ENV"), Some(OsStr::new("/work/py3")))));
        assert!(envs.contains(&(OsStr::new("PYTHONHOME"), None)));
    }

    #[test]
    fn test_activate_failure_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let log = ToolLog::acquire(temp.path(), "bootstrap.log").unwrap();
        let layout = VenvLayout::new(temp.path().join("py3"), Os::detect().unwrap());
        let runner = MockRunner::new().with_status(ToolKind::Activate, ToolStatus::Exited(1));

        let err = activate(&runner, &layout, &log).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::ActivationFailed { status: Some(1), .. }
        ));
        assert_eq!(runner.call_count(ToolKind::Activate), 1);
    }

    #[test]
    fn test_activate_invokes_script_in_append_mode() {
        let temp = tempfile::tempdir().unwrap();
        let log = ToolLog::acquire(temp.path(), "bootstrap.log").unwrap();
        let layout = VenvLayout::new(temp.path().join("py3"), Os::detect().unwrap());
        let runner = MockRunner::new();

        let env = activate(&runner, &layout, &log).unwrap();
        assert!(env.get("VIRTUAL_ENV").is_some());

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].log_mode, LogMode::Append);
        assert_eq!(
            invocations[0].args.last().unwrap(),
            layout.activate_script().as_os_str()
        );
    }

    #[cfg(unix)]
    proptest! {
        #[test]
        fn scripts_dir_always_first_on_path(
            entries in proptest::collection::vec("/[a-z]{1,8}(/[a-z]{1,8}){0,3}", 0..6)
        ) {
            let existing = entries.join(":");
            let layout = VenvLayout::new("/work/env", Os::Linux);
            let env = ActivatedEnvironment::compute(&layout, |name| {
                (name == "PATH").then(|| OsString::from(&existing))
            })
            .unwrap();

            let Some(EnvValue::Set(path)) = env.get("PATH") else {
                panic!("PATH must be set");
            };
            let parts: Vec<_> = std::env::split_paths(path).collect();
            prop_assert_eq!(&parts[0], &PathBuf::from("/work/env/bin"));
            prop_assert_eq!(parts.len(), entries.len() + 1);
        }
    }
}
