//! git adapter for fetching extension source trees.
//!
//! Provisioning only ever needs one shallow clone per repository, so the
//! client exposes exactly that. An existing non-empty destination is reused
//! instead of re-cloned, which keeps re-runs of a recipe from failing on a
//! workdir left behind by an earlier attempt.

use std::fs;
use std::path::Path;
use std::process::Command;

/// Errors from interacting with git.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git executable `{0}` is not available in PATH")]
    NotInstalled(String),

    #[error("git command failed: git {args} ({message})")]
    CommandFailed { args: String, message: String },
}

/// How a clone request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneOutcome {
    /// A fresh shallow clone was created at the destination.
    Cloned,
    /// The destination already held content and was left as found.
    Reused,
}

impl CloneOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloned => "cloned",
            Self::Reused => "reused",
        }
    }
}

/// Thin client around the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitClient {
    program: String,
}

impl Default for GitClient {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns true if the configured git executable responds to `--version`.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Shallow-clone `url` into `dest`, optionally at branch or tag `rev`.
    pub fn clone_into(
        &self,
        url: &str,
        dest: &Path,
        rev: Option<&str>,
    ) -> Result<CloneOutcome, GitError> {
        if dir_has_entries(dest) {
            return Ok(CloneOutcome::Reused);
        }

        let dest = dest.display().to_string();
        let args = clone_args(url, &dest, rev);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs)?;
        Ok(CloneOutcome::Cloned)
    }

    fn run(&self, args: &[&str]) -> Result<(), GitError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    GitError::NotInstalled(self.program.clone())
                } else {
                    GitError::CommandFailed {
                        args: args.join(" "),
                        message: err.to_string(),
                    }
                }
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                "unknown error".to_string()
            } else {
                stderr
            };
            Err(GitError::CommandFailed {
                args: args.join(" "),
                message,
            })
        }
    }
}

fn clone_args(url: &str, dest: &str, rev: Option<&str>) -> Vec<String> {
    let mut args = vec!["clone".to_string(), "--depth".to_string(), "1".to_string()];
    if let Some(rev) = rev {
        args.push("--branch".to_string());
        args.push(rev.to_string());
    }
    args.push(url.to_string());
    args.push(dest.to_string());
    args
}

fn dir_has_entries(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
