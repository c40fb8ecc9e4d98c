//! pip adapter for package discovery and source builds.
//!
//! This crate is intentionally thin: it shells out to `pip` for install
//! metadata and build invocations and keeps no environment policy. A failed
//! invocation surfaces as an error for the caller to abort on; there are no
//! retries.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Errors from interacting with pip.
#[derive(Debug, thiserror::Error)]
pub enum PipError {
    #[error("pip executable `{0}` is not available in PATH")]
    NotInstalled(String),

    #[error("package `{0}` is not installed")]
    PackageNotFound(String),

    #[error("pip command failed: pip {args} ({message})")]
    CommandFailed { args: String, message: String },

    #[error("unable to parse pip output: {0}")]
    Parse(String),
}

/// Thin client around the `pip` CLI.
#[derive(Debug, Clone)]
pub struct PipClient {
    program: String,
}

impl Default for PipClient {
    fn default() -> Self {
        Self::new("pip")
    }
}

impl PipClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns true if the configured pip executable responds to `--version`.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Installation directory of `package`, from the `Location:` field of
    /// `pip show`.
    ///
    /// `pip show` exits non-zero only for unknown distributions, so a failed
    /// invocation reports the package as not installed rather than a broken
    /// pip.
    pub fn package_location(&self, package: &str) -> Result<PathBuf, PipError> {
        let stdout = match self.run(&["show", package]) {
            Ok(stdout) => stdout,
            Err(PipError::CommandFailed { .. }) => {
                return Err(PipError::PackageNotFound(package.to_string()));
            }
            Err(err) => return Err(err),
        };

        location_field(&stdout)
            .map(PathBuf::from)
            .ok_or_else(|| PipError::PackageNotFound(package.to_string()))
    }

    /// Build and install a source tree: `pip install --no-build-isolation <dir>`.
    pub fn install_from_source(&self, dir: &Path) -> Result<(), PipError> {
        let dir = dir.display().to_string();
        self.run(&["install", "--no-build-isolation", &dir])?;
        Ok(())
    }

    fn run(&self, args: &[&str]) -> Result<String, PipError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    PipError::NotInstalled(self.program.clone())
                } else {
                    PipError::CommandFailed {
                        args: args.join(" "),
                        message: err.to_string(),
                    }
                }
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                "unknown error".to_string()
            } else {
                stderr
            };
            Err(PipError::CommandFailed {
                args: args.join(" "),
                message,
            })
        }
    }
}

fn location_field(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Location:"))
        .map(str::trim)
        .filter(|location| !location.is_empty())
}

#[cfg(test)]
mod tests {
    use super::location_field;

    #[test]
    fn location_field_parses_pip_show_output() {
        let stdout = "Name: torch\nVersion: 2.3.0\nLocation: /opt/venv/lib/python3.10/site-packages\nRequires: filelock\n";
        assert_eq!(
            location_field(stdout),
            Some("/opt/venv/lib/python3.10/site-packages")
        );
    }

    #[test]
    fn location_field_none_without_the_field() {
        assert_eq!(location_field("Name: torch\nVersion: 2.3.0\n"), None);
    }

    #[test]
    fn location_field_none_for_empty_value() {
        assert_eq!(location_field("Location:   \n"), None);
    }
}
