//! Orchestration of the full resolution pipeline.
//!
//! The [`DependenciesManager`] ties the pieces together: load the root
//! manifest (which must be valid as a root), build and slash the dependency
//! tree, and reconcile the resolved set with the output directory.
//!
//! Two health checks guard the output directory:
//! - *dirty*: the directory disagrees with the resolved tree (missing,
//!   extra, or stale libraries). Fixed by `resolve`.
//! - *corrupted*: a dependency's on-disk content no longer matches the
//!   canonical cached content for the version its manifest records, i.e. it
//!   was edited in place. Reported to the user and only overwritten with
//!   `resolve --force`. Corruption dominates dirtiness so the user sees one
//!   unambiguous error. (Manual deletion, addition of a valid copy, or
//!   wholesale replacement with a legitimately newer version cannot be
//!   detected without a durable last-resolved manifest.)

use crate::cache::{Cache, content_hash};
use crate::core::dep::Dep;
use crate::core::error::{ComboError, user_friendly_error};
use crate::importer::Importer;
use crate::manifest::{Expected, Manifest};
use crate::resolver::DependencyTree;
use crate::source::SourceLocator;
use crate::utils::fs::{copy_dir, ensure_dir, remove_dir_all, subdirectories};
use anyhow::Result;
use colored::Colorize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// One way the output directory can disagree with the resolved tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// More contrib directories than resolved dependencies
    MoreContrib(usize),
    /// More resolved dependencies than contrib directories
    MoreTree(usize),
    /// A resolved dependency has no contrib directory
    MissingFromContrib(String),
    /// A contrib directory's name is not in the resolved set
    MissingFromTree(String),
    /// Names match but the directory content differs from the cache
    ModifiedContent(String),
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MoreContrib(count) => {
                write!(f, "More contrib directories than tree dependencies: {count}")
            }
            Self::MoreTree(count) => {
                write!(f, "More tree dependencies than contrib directories: {count}")
            }
            Self::MissingFromContrib(name) => {
                write!(f, "Dependency from tree missing from contrib: {name}")
            }
            Self::MissingFromTree(name) => {
                write!(f, "Directory from contrib does not exist in the dependencies tree: {name}")
            }
            Self::ModifiedContent(name) => write!(f, "Modified content: {name}"),
        }
    }
}

/// Orchestrates root manifest → tree → resolution → reconciliation.
#[derive(Debug)]
pub struct DependenciesManager<L> {
    base_manifest: Manifest,
    output_dir: PathBuf,
    importer: Importer<L>,
    tree: DependencyTree,
}

impl<L: SourceLocator> DependenciesManager<L> {
    /// Loads the root manifest of `repo_dir` and prepares an importer over
    /// the given locator and cache.
    ///
    /// # Errors
    ///
    /// Fails when the manifest is missing, invalid, or not valid as a root
    /// (no `output_directory`).
    pub fn new(repo_dir: &Path, locator: L, cache: Cache) -> Result<Self> {
        let base_manifest = Manifest::load(repo_dir, Expected::Root)?;
        let Some(output_dir) = base_manifest.output_dir() else {
            return Err(ComboError::InvalidManifest {
                dir: repo_dir.display().to_string(),
                reason: "a root manifest must declare \"output_directory\"".to_string(),
            }
            .into());
        };

        Ok(Self {
            base_manifest,
            output_dir,
            importer: Importer::new(locator, cache),
            tree: DependencyTree::new(),
        })
    }

    /// Enforces the cache storage budget.
    pub fn cleanup(&mut self) -> Result<()> {
        self.importer.cleanup()
    }

    /// The contrib directory a library materializes into.
    #[must_use]
    pub fn dependency_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(Dep::normalize_name(name))
    }

    async fn initialize_tree(&mut self) -> Result<()> {
        if !self.tree.ready() {
            self.tree.build(&self.base_manifest, &mut self.importer).await?;
            self.tree.disconnect_outdated_versions()?;
        }
        Ok(())
    }

    /// Brings the output directory into conformance with the resolved tree.
    ///
    /// Unless `force` is set, a corrupted output directory aborts the
    /// resolve before anything is touched. Returns `true` when the output
    /// directory was modified, `false` when everything was already
    /// up-to-date.
    pub async fn resolve(&mut self, force: bool) -> Result<bool> {
        if !force {
            self.check_corruption().await?;
        }

        self.initialize_tree().await?;

        let mismatches = self.dirty_mismatches().await?;
        if mismatches.is_empty() {
            println!("Project is already up-to-date");
            return Ok(false);
        }
        for mismatch in &mismatches {
            tracing::debug!("Dirty: {mismatch}");
        }

        self.materialize().await?;
        Ok(true)
    }

    /// Whether the output directory disagrees with the resolved tree.
    ///
    /// Corruption dominates: when a corrupted dependency is detected the
    /// dirty indication is suppressed (`false`) and the corruption is
    /// reported on its own, so the user sees exactly one problem to act on.
    pub async fn is_dirty(&mut self) -> Result<bool> {
        if let Err(e) = self.check_corruption().await {
            if matches!(
                e.downcast_ref::<ComboError>(),
                Some(ComboError::CorruptedDependency { .. })
            ) {
                user_friendly_error(e).display();
                return Ok(false);
            }
            return Err(e);
        }

        Ok(!self.dirty_mismatches().await?.is_empty())
    }

    /// Enumerates every disagreement between the output directory and the
    /// resolved tree.
    pub async fn dirty_mismatches(&mut self) -> Result<Vec<Mismatch>> {
        self.initialize_tree().await?;

        let contrib_dirs: Vec<PathBuf> = subdirectories(&self.output_dir)?
            .into_iter()
            .filter(|dir| Manifest::is_combo_repo(dir))
            .collect();
        let dependencies: Vec<Dep> = self.tree.dependencies().iter().cloned().collect();

        let tree_names: Vec<String> = dependencies.iter().map(Dep::normalized_name).collect();
        let contrib_names: Vec<String> = contrib_dirs
            .iter()
            .filter_map(|dir| dir.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();

        let mut mismatches = Vec::new();

        if contrib_names.len() > tree_names.len() {
            mismatches.push(Mismatch::MoreContrib(contrib_names.len() - tree_names.len()));
        } else if tree_names.len() > contrib_names.len() {
            mismatches.push(Mismatch::MoreTree(tree_names.len() - contrib_names.len()));
        }

        for name in &tree_names {
            if !contrib_names.contains(name) {
                mismatches.push(Mismatch::MissingFromContrib(name.clone()));
            }
        }
        for name in &contrib_names {
            if !tree_names.contains(name) {
                mismatches.push(Mismatch::MissingFromTree(name.clone()));
            }
        }

        if !mismatches.is_empty() {
            return Ok(mismatches);
        }

        // Names agree on both sides; what remains is content
        for dep in &dependencies {
            if !self.dep_content_matches(dep).await? {
                mismatches.push(Mismatch::ModifiedContent(dep.name.clone()));
            }
        }

        Ok(mismatches)
    }

    /// Detects dependencies that were edited in place in the output
    /// directory.
    ///
    /// Each contrib directory's manifest recovers the `(name, version)` it
    /// was materialized from; its content hash must equal the canonical
    /// cached hash for that dep.
    pub async fn check_corruption(&mut self) -> Result<()> {
        for dir in subdirectories(&self.output_dir)? {
            if !Manifest::is_combo_repo(&dir) {
                continue;
            }

            let manifest = Manifest::load(&dir, Expected::DirName)?;
            let dep = manifest.as_dep();
            let expected = self.importer.get_hash(&dep).await?;
            let actual = content_hash(&dir)?;

            if expected != actual {
                return Err(ComboError::CorruptedDependency { name: dep.name }.into());
            }
        }
        Ok(())
    }

    async fn dep_content_matches(&mut self, dep: &Dep) -> Result<bool> {
        let contrib_dir = self.dependency_path(&dep.name);
        if !contrib_dir.exists() {
            return Ok(false);
        }

        let expected = self.importer.get_hash(dep).await?;
        Ok(content_hash(&contrib_dir)? == expected)
    }

    async fn materialize(&mut self) -> Result<()> {
        let dependencies: Vec<Dep> = self.tree.dependencies().iter().cloned().collect();
        check_for_multiple_versions(&dependencies)?;

        ensure_dir(&self.output_dir)?;

        for dep in &dependencies {
            if self.dep_content_matches(dep).await? {
                continue;
            }

            let dst = self.dependency_path(&dep.name);
            if dst.exists() {
                println!("{} deprecated dependency {}", "Removing".yellow().bold(), dep.name);
                remove_dir_all(&dst)?;
            }

            println!("{} dependency {dep} into {}", "Adding".green().bold(), dst.display());
            let src = self.importer.get_cached_path(dep).await?;
            copy_dir(&src, &dst)?;
        }

        // Leftovers that are no longer part of the resolved set
        let surviving: HashSet<String> = dependencies.iter().map(Dep::normalized_name).collect();
        for dir in subdirectories(&self.output_dir)? {
            let Some(name) = dir.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            if !surviving.contains(&name) && Manifest::is_combo_repo(&dir) {
                println!("{} deprecated dependency {name}", "Removing".yellow().bold());
                remove_dir_all(&dir)?;
            }
        }

        Ok(())
    }
}

fn check_for_multiple_versions(dependencies: &[Dep]) -> Result<()> {
    let mut versions_per_name: HashMap<&str, usize> = HashMap::new();
    for dep in dependencies {
        *versions_per_name.entry(&dep.name).or_default() += 1;
    }

    let multiple: Vec<&str> = versions_per_name
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name)
        .collect();

    if multiple.is_empty() {
        Ok(())
    } else {
        Err(ComboError::UnhandledCombo {
            message: format!("multiple versions survived resolution for: {}", multiple.join(", ")),
        }
        .into())
    }
}
