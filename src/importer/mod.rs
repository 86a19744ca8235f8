//! Fetching dependencies into the cache.
//!
//! The importer consumes a [`SourceLocator`] and the [`Cache`]: it resolves a
//! [`Dep`] to a source descriptor, dispatches on the descriptor variant to
//! perform the actual fetch, and returns the cached path. A cache hit is
//! validated first; a tampered entry is evicted and refetched. A failed fetch
//! never leaves a partial clone behind.
//!
//! Fetches happen strictly one at a time; within an invocation the
//! resolution tree memoizes canonical nodes so each dep is fetched at most
//! once.

use crate::cache::Cache;
use crate::core::dep::Dep;
use crate::core::error::ComboError;
use crate::git::GitRepo;
use crate::source::{SourceDescriptor, SourceLocator};
use crate::utils::fs::{copy_dir, remove_dir_all};
use anyhow::Result;
use colored::Colorize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

fn is_tampered(error: &anyhow::Error) -> bool {
    matches!(error.downcast_ref::<ComboError>(), Some(ComboError::Tampered { .. }))
}

/// Fetches dependencies through a source locator into the cache.
#[derive(Debug)]
pub struct Importer<L> {
    locator: L,
    cache: Cache,
}

impl<L: SourceLocator> Importer<L> {
    /// Creates an importer over the given locator and cache.
    pub fn new(locator: L, cache: Cache) -> Self {
        Self { locator, cache }
    }

    /// Read access to the underlying cache.
    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Ensures `dep` is cached and valid, and returns its cached path.
    ///
    /// A valid cache hit short-circuits; a tampered entry is evicted and the
    /// dependency is fetched again from its source.
    pub async fn fetch(&mut self, dep: &Dep) -> Result<PathBuf> {
        let target = self.cache.dep_path(dep);

        if self.cache.has(dep) {
            match self.cache.validate(dep) {
                Ok(()) => return Ok(target),
                Err(e) if is_tampered(&e) => {
                    tracing::warn!("Cache entry for {dep} was tampered with; refetching");
                    self.cache.remove(dep)?;
                }
                Err(e) => return Err(e),
            }
        }

        println!("{} dependency {dep}", "Caching".green().bold());

        let descriptor = self.locator.get_source(&dep.name, &dep.version).await?;
        if let Err(e) = fetch_from_source(&descriptor, &target).await {
            // Never leave a partial clone behind
            remove_dir_all(&target)?;
            return Err(e);
        }

        self.cache.record(dep)?;
        Ok(target)
    }

    /// The cached path of `dep`, validating first and refetching when the
    /// entry is missing or tampered.
    pub async fn get_cached_path(&mut self, dep: &Dep) -> Result<PathBuf> {
        match self.cache.get_path(dep) {
            Ok(path) => Ok(path),
            Err(e) if is_tampered(&e) => {
                self.cache.remove(dep)?;
                self.fetch(dep).await
            }
            Err(e) => Err(e),
        }
    }

    /// The content hash of `dep`: the recorded one when cached, otherwise
    /// fetch first and return the freshly computed hash.
    pub async fn get_hash(&mut self, dep: &Dep) -> Result<String> {
        if self.cache.has(dep)
            && let Some(hash) = self.cache.hash_of(dep)
        {
            return Ok(hash.to_string());
        }

        self.fetch(dep).await?;
        self.cache.hash_of(dep).map(str::to_string).ok_or_else(|| {
            ComboError::UnhandledCombo {
                message: format!("dependency {dep} has no hash after a successful fetch"),
            }
            .into()
        })
    }

    /// Enforces the cache storage budget.
    pub fn cleanup(&mut self) -> Result<()> {
        self.cache.apply_limit()
    }
}

/// Populates `target` from a source descriptor.
async fn fetch_from_source(descriptor: &SourceDescriptor, target: &Path) -> Result<()> {
    // A leftover directory from an interrupted run would make the clone fail
    remove_dir_all(target)?;

    match descriptor {
        SourceDescriptor::Git { url, commit_hash } => {
            let repo = GitRepo::new(target);
            repo.clone_at(url, commit_hash).await?;
            // The cached copy is a plain snapshot
            repo.strip_metadata()
        }
        SourceDescriptor::LocalPath { path } => {
            if !path.exists() {
                return Err(ComboError::NonExistingLocalPath {
                    path: path.display().to_string(),
                }
                .into());
            }
            copy_dir(path, target)
        }
    }
}

/// Derives publishable version details from a library working copy.
///
/// Used by the upload flow: a `git` working copy contributes its origin URL
/// and HEAD commit, a `local_path` one its absolute path.
#[derive(Debug)]
pub struct SourceDetailsProvider {
    working_dir: PathBuf,
}

impl SourceDetailsProvider {
    /// Creates a provider for the given working copy.
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self { working_dir: working_dir.into() }
    }

    /// Version details of the requested source type.
    pub async fn details(&self, source_type: &str) -> Result<Value> {
        match source_type {
            "git" => {
                let repo = GitRepo::new(&self.working_dir);
                Ok(json!({
                    "type": "git",
                    "url": repo.origin_url().await?,
                    "commit_hash": repo.current_commit().await?,
                }))
            }
            "local_path" => {
                let absolute = self.working_dir.canonicalize()?;
                Ok(json!({ "type": "local_path", "path": absolute }))
            }
            other => Err(ComboError::UnhandledCombo {
                message: format!("unsupported source type \"{other}\""),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Locator serving a fixed in-memory map, for sandboxed fetches.
    struct FixedLocator {
        sources: HashMap<(String, String), SourceDescriptor>,
    }

    impl SourceLocator for FixedLocator {
        async fn get_source(
            &self,
            name: &str,
            version: &crate::version::Version,
        ) -> Result<SourceDescriptor> {
            self.sources
                .get(&(name.to_string(), version.to_string()))
                .cloned()
                .ok_or_else(|| ComboError::UndefinedProject { name: name.to_string() }.into())
        }

        async fn available_versions(
            &self,
        ) -> Result<IndexMap<String, Vec<crate::version::Version>>> {
            Ok(IndexMap::new())
        }
    }

    fn dep(name: &str, version: &str) -> Dep {
        Dep::new(name, version.parse().unwrap())
    }

    /// A sandbox with one local-path library `Lib A 1.0`.
    fn sandbox() -> (TempDir, Importer<FixedLocator>) {
        let temp = TempDir::new().unwrap();

        let lib_dir = temp.path().join("libs/a");
        fs::create_dir_all(&lib_dir).unwrap();
        fs::write(lib_dir.join("lib_a.h"), "#pragma once\n").unwrap();

        let mut sources = HashMap::new();
        sources.insert(
            ("Lib A".to_string(), "1.0".to_string()),
            SourceDescriptor::LocalPath { path: lib_dir },
        );
        sources.insert(
            ("Ghost".to_string(), "1.0".to_string()),
            SourceDescriptor::LocalPath { path: temp.path().join("does/not/exist") },
        );

        let cache = Cache::with_dir(temp.path().join("Combo")).unwrap();
        (temp, Importer::new(FixedLocator { sources }, cache))
    }

    #[tokio::test]
    async fn fetch_copies_local_path_into_cache() {
        let (_temp, mut importer) = sandbox();
        let lib = dep("Lib A", "1.0");

        let path = importer.fetch(&lib).await.unwrap();

        assert!(path.join("lib_a.h").exists());
        assert!(importer.cache().has(&lib));
        importer.cache().validate(&lib).unwrap();
    }

    #[tokio::test]
    async fn fetch_is_idempotent() {
        let (_temp, mut importer) = sandbox();
        let lib = dep("Lib A", "1.0");

        let first = importer.fetch(&lib).await.unwrap();
        let second = importer.fetch(&lib).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_local_path_leaves_no_partial_clone() {
        let (_temp, mut importer) = sandbox();
        let ghost = dep("Ghost", "1.0");

        let err = importer.fetch(&ghost).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ComboError>(),
            Some(ComboError::NonExistingLocalPath { .. })
        ));
        assert!(!importer.cache().dep_path(&ghost).exists());
        assert!(!importer.cache().has(&ghost));
    }

    #[tokio::test]
    async fn tampered_entry_is_refetched() {
        let (_temp, mut importer) = sandbox();
        let lib = dep("Lib A", "1.0");

        let path = importer.fetch(&lib).await.unwrap();
        fs::write(path.join("lib_a.h"), "tampered").unwrap();

        let recovered = importer.get_cached_path(&lib).await.unwrap();
        assert_eq!(fs::read_to_string(recovered.join("lib_a.h")).unwrap(), "#pragma once\n");
        importer.cache().validate(&lib).unwrap();
    }

    #[tokio::test]
    async fn get_hash_fetches_when_not_cached() {
        let (_temp, mut importer) = sandbox();
        let lib = dep("Lib A", "1.0");

        let hash = importer.get_hash(&lib).await.unwrap();
        assert!(importer.cache().has(&lib));
        assert_eq!(importer.cache().hash_of(&lib).unwrap(), hash);
    }
}
