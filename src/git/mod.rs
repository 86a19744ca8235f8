//! Git operations wrapper using the system git command.
//!
//! Dependencies fetched from git sources are plain snapshots: the repository
//! is cloned, the pinned commit is checked out detached, and the `.git`
//! metadata is removed so the cached copy is just files. The same wrapper
//! reads a working copy's origin URL and HEAD commit when publishing version
//! details to the registry.

use crate::utils::fs::remove_dir_all;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub mod command_builder;
pub use command_builder::GitCommand;

/// Handle to a git repository (or future repository) at a local path.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Creates a handle for the repository at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The local path of this repository.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clones `url` into this handle's path and detaches HEAD at
    /// `commit_hash`.
    pub async fn clone_at(&self, url: &str, commit_hash: &str) -> Result<()> {
        GitCommand::clone_repo(url, &self.path)
            .execute_success()
            .await
            .with_context(|| format!("Failed to clone {url}"))?;

        GitCommand::checkout_detached(commit_hash)
            .current_dir(&self.path)
            .execute_success()
            .await
            .with_context(|| format!("Failed to check out commit {commit_hash}"))
    }

    /// Removes the `.git` metadata directory, leaving a plain snapshot.
    pub fn strip_metadata(&self) -> Result<()> {
        remove_dir_all(&self.path.join(".git"))
    }

    /// The commit hash HEAD currently points at.
    pub async fn current_commit(&self) -> Result<String> {
        GitCommand::current_commit().current_dir(&self.path).execute_stdout().await
    }

    /// The URL of the `origin` remote.
    pub async fn origin_url(&self) -> Result<String> {
        GitCommand::remote_url().current_dir(&self.path).execute_stdout().await
    }
}
