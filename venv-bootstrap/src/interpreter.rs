//! Interpreter major version the environment is bound to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported interpreter major versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum InterpreterVersion {
    Python2,
    #[default]
    Python3,
}

impl InterpreterVersion {
    /// Major version number.
    pub fn major(&self) -> u8 {
        match self {
            Self::Python2 => 2,
            Self::Python3 => 3,
        }
    }

    /// Default environment directory name (`py2` / `py3`).
    pub fn env_dir_name(&self) -> &'static str {
        match self {
            Self::Python2 => "py2",
            Self::Python3 => "py3",
        }
    }

    /// Interpreter executable the creation tool should bind to.
    pub fn executable_name(&self) -> &'static str {
        match self {
            Self::Python2 => "python2",
            Self::Python3 => "python3",
        }
    }

    /// Arguments that select this interpreter on the `virtualenv` command line.
    pub fn selector_args(&self) -> [&'static str; 2] {
        ["-p", self.executable_name()]
    }
}

impl TryFrom<u8> for InterpreterVersion {
    type Error = String;

    fn try_from(major: u8) -> Result<Self, Self::Error> {
        match major {
            2 => Ok(Self::Python2),
            3 => Ok(Self::Python3),
            other => Err(format!(
                "Unsupported Python major version: {} (expected 2 or 3)",
                other
            )),
        }
    }
}

impl From<InterpreterVersion> for u8 {
    fn from(version: InterpreterVersion) -> Self {
        version.major()
    }
}

impl FromStr for InterpreterVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "2" | "py2" | "python2" => Ok(Self::Python2),
            "3" | "py3" | "python3" => Ok(Self::Python3),
            other => Err(format!(
                "Unknown Python version '{}' (expected 2 or 3)",
                other
            )),
        }
    }
}

impl fmt::Display for InterpreterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Python {}", self.major())
    }
}
