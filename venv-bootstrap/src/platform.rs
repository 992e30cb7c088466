//! Host platform detection and virtual environment layout.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors related to platform detection.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Unsupported operating system: {0}")]
    UnsupportedOs(String),
}

/// Supported operating systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    MacOs,
    Linux,
    Windows,
}

impl Os {
    /// Detect the current operating system.
    pub fn detect() -> Result<Self, PlatformError> {
        if cfg!(target_os = "macos") {
            Ok(Os::MacOs)
        } else if cfg!(target_os = "linux") {
            Ok(Os::Linux)
        } else if cfg!(target_os = "windows") {
            Ok(Os::Windows)
        } else {
            Err(PlatformError::UnsupportedOs(
                std::env::consts::OS.to_string(),
            ))
        }
    }

    /// Get the OS string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::MacOs => "macOS",
            Os::Linux => "Linux",
            Os::Windows => "Windows",
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Os::Windows)
    }

    /// Directory inside a venv holding executables and activation scripts.
    pub fn scripts_dir_name(&self) -> &'static str {
        if self.is_windows() { "Scripts" } else { "bin" }
    }

    pub fn activate_script_name(&self) -> &'static str {
        if self.is_windows() {
            "activate.bat"
        } else {
            "activate"
        }
    }

    pub fn python_executable_name(&self) -> &'static str {
        if self.is_windows() {
            "python.exe"
        } else {
            "python"
        }
    }

    /// Variable holding the interactive shell prompt.
    pub fn prompt_var(&self) -> &'static str {
        if self.is_windows() { "PROMPT" } else { "PS1" }
    }

    /// Prompt value assumed when the variable is not set.
    pub fn default_prompt(&self) -> &'static str {
        if self.is_windows() { "$P$G" } else { "" }
    }

    /// Program and arguments that run an activation script in a child shell.
    ///
    /// On Unix the script is sourced by `sh` with the path in `$1`. `$0` must
    /// not be the script path: virtualenv's `activate` exits 33 under bash
    /// when `$0` equals the sourced file. On Windows the batch file is
    /// `call`ed through `cmd`.
    pub fn activation_command(&self, script: &Path) -> (OsString, Vec<OsString>) {
        if self.is_windows() {
            (
                OsString::from("cmd"),
                vec!["/C".into(), "call".into(), script.as_os_str().to_owned()],
            )
        } else {
            (
                OsString::from("sh"),
                vec![
                    "-c".into(),
                    ". \"$1\"".into(),
                    "sh".into(),
                    script.as_os_str().to_owned(),
                ],
            )
        }
    }

    /// Interactive shell to hand the activated environment to.
    pub fn user_shell(&self) -> OsString {
        let (var, fallback) = if self.is_windows() {
            ("COMSPEC", "cmd.exe")
        } else {
            ("SHELL", "sh")
        };
        std::env::var_os(var)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| OsString::from(fallback))
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_str(), std::env::consts::ARCH)
    }
}

/// Paths inside a virtual environment for a given OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenvLayout {
    root: PathBuf,
    os: Os,
}

impl VenvLayout {
    pub fn new(root: impl Into<PathBuf>, os: Os) -> Self {
        Self {
            root: root.into(),
            os,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn os(&self) -> Os {
        self.os
    }

    /// Environment name shown in the prompt (the root's final component).
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join(self.os.scripts_dir_name())
    }

    pub fn activate_script(&self) -> PathBuf {
        self.scripts_dir().join(self.os.activate_script_name())
    }

    /// Interpreter inside the environment.
    pub fn python(&self) -> PathBuf {
        self.scripts_dir().join(self.os.python_executable_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_detection() {
        let os = Os::detect().unwrap();
        // Should not panic and should return valid values
        let _ = os.scripts_dir_name();
        let _ = os.to_string();
    }

    #[test]
    fn test_unix_layout() {
        let layout = VenvLayout::new("py3", Os::Linux);
        assert_eq!(layout.scripts_dir(), PathBuf::from("py3/bin"));
        assert_eq!(layout.activate_script(), PathBuf::from("py3/bin/activate"));
        assert_eq!(layout.python(), PathBuf::from("py3/bin/python"));
        assert_eq!(layout.name(), "py3");
    }

    #[test]
    fn test_windows_layout() {
        let layout = VenvLayout::new("py2", Os::Windows);
        assert!(layout.activate_script().ends_with("Scripts/activate.bat"));
        assert!(layout.python().ends_with("Scripts/python.exe"));
        assert_eq!(Os::Windows.prompt_var(), "PROMPT");
    }

    #[test]
    fn test_activation_command() {
        let (program, args) = Os::Linux.activation_command(Path::new("py3/bin/activate"));
        assert_eq!(program, "sh");
        assert_eq!(args[0], "-c");
        assert_eq!(args[1], ". \"$1\"");
        assert_eq!(args[2], "sh");
        assert_eq!(args[3], "py3/bin/activate");

        let (program, args) = Os::Windows.activation_command(Path::new("py3\\Scripts\\activate.bat"));
        assert_eq!(program, "cmd");
        assert_eq!(args[..2], [OsString::from("/C"), OsString::from("call")]);
    }
}
