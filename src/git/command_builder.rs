//! Type-safe git command builder for consistent command execution.
//!
//! Wraps the system git binary behind a fluent API so that every call site
//! gets the same error handling and output capture. Only the capabilities
//! the importer and the upload flow need are exposed: clone, detached
//! checkout, and reading the origin URL / HEAD commit.

use crate::core::error::ComboError;
use anyhow::Result;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Builder for constructing and executing git commands.
#[derive(Debug, Default)]
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<std::path::PathBuf>,
}

impl GitCommand {
    /// Creates a new builder with an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory the command runs in.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Runs the command, returning captured stdout on success.
    ///
    /// # Errors
    ///
    /// - [`ComboError::GitNotFound`] when no git binary is in PATH
    /// - [`ComboError::GitCommandError`] when git exits non-zero, with the
    ///   captured stderr
    pub async fn execute_stdout(self) -> Result<String> {
        let git = which::which("git").map_err(|_| ComboError::GitNotFound)?;
        let operation = self.args.first().cloned().unwrap_or_default();

        tracing::debug!("Running git {}", self.args.join(" "));

        let mut command = Command::new(git);
        command.args(&self.args).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|e| ComboError::GitCommandError {
            operation: operation.clone(),
            stderr: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(ComboError::GitCommandError {
                operation,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Runs the command, discarding output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute_stdout().await.map(|_| ())
    }

    // Pre-configured commands

    /// `git clone <url> <target>`
    #[must_use]
    pub fn clone_repo(url: &str, target: impl AsRef<Path>) -> Self {
        let target = target.as_ref().display().to_string();
        Self::new().args([String::from("clone"), url.to_string(), target])
    }

    /// `git checkout --detach <ref>`
    #[must_use]
    pub fn checkout_detached(ref_name: &str) -> Self {
        Self::new().args(["checkout", "--detach", ref_name])
    }

    /// `git rev-parse HEAD`
    #[must_use]
    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    /// `git remote get-url origin`
    #[must_use]
    pub fn remote_url() -> Self {
        Self::new().args(["remote", "get-url", "origin"])
    }
}
