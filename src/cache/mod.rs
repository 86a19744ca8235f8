//! Persistent content-addressed store of fetched dependencies.
//!
//! The cache lives under a per-user application directory and contains:
//! - a `clones/` subdirectory storing each fetched library at
//!   `clones/<normalized-name>/<normalized-version>`
//! - a sidecar index `local_projects.json` mapping the textual form of a
//!   [`Dep`] to the size and content hash of its directory
//!
//! An entry exists iff the cached directory exists, measures the recorded
//! size, and hashes to the recorded digest; any disagreement is surfaced as
//! `Tampered` and recovered by the importer through eviction and refetch.
//!
//! The index is insertion-ordered, which is what the FIFO storage bound
//! iterates: while the clones directory exceeds the budget, the oldest entry
//! is evicted. The index is persisted atomically (temp file plus rename) so
//! an interrupted run leaves either the old valid state or no entry at all.
//!
//! The cache is process-local; callers are expected to be a single
//! invocation at a time.

use crate::constants::{
    CACHE_DIR_ENV, CACHE_INDEX_FILE_NAME, CACHE_SIZE_LIMIT, CLONES_DIR_NAME, HASH_BLOCK_SIZE,
};
use crate::core::dep::Dep;
use crate::core::error::ComboError;
use crate::utils::fs::{atomic_write, dir_size, ensure_dir, remove_dir_all};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Size and content hash recorded for a cached dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Total size in bytes of the cached directory
    pub size: u64,
    /// Content hash of the cached directory tree
    pub hash: String,
}

/// Deterministic hash over a directory tree.
///
/// Files are visited in sorted order; for each one the hash absorbs its
/// path relative to `dir` followed by its contents in 4 KiB blocks. The
/// digest is an integrity check, not an adversarial defense.
pub fn content_hash(dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .context("Walked outside the hashed directory")?;
        hasher.update(relative.to_string_lossy().as_bytes());

        let mut file = fs::File::open(entry.path())
            .with_context(|| format!("Failed to open {} for hashing", entry.path().display()))?;
        let mut block = [0u8; HASH_BLOCK_SIZE];
        loop {
            let read = file.read(&mut block)?;
            if read == 0 {
                break;
            }
            hasher.update(&block[..read]);
        }
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Content-addressed store of fetched dependencies with a bounded size.
#[derive(Debug)]
pub struct Cache {
    root: PathBuf,
    clones_dir: PathBuf,
    index_path: PathBuf,
    index: IndexMap<String, CacheEntry>,
    size_limit: u64,
}

impl Cache {
    /// The per-user cache directory: `$COMBO_CACHE_DIR` override,
    /// `%APPDATA%\Combo` on Windows, `~/.Combo` elsewhere.
    pub fn default_location() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        if cfg!(windows) {
            let appdata = std::env::var("APPDATA").context("APPDATA is not set")?;
            Ok(PathBuf::from(appdata).join("Combo"))
        } else {
            let home = dirs::home_dir().context("Could not determine the home directory")?;
            Ok(home.join(".Combo"))
        }
    }

    /// Opens the cache at its default per-user location.
    pub fn open() -> Result<Self> {
        Self::with_dir(Self::default_location()?)
    }

    /// Opens a cache rooted at `root`, creating the layout and an empty
    /// index as needed. Used directly by tests to sandbox the cache.
    pub fn with_dir(root: PathBuf) -> Result<Self> {
        let clones_dir = root.join(CLONES_DIR_NAME);
        ensure_dir(&clones_dir)?;

        let index_path = root.join(CACHE_INDEX_FILE_NAME);
        let index = if index_path.exists() {
            let contents = fs::read_to_string(&index_path).with_context(|| {
                format!("Failed to read cache index: {}", index_path.display())
            })?;
            serde_json::from_str(&contents).with_context(|| {
                format!("Cache index is not valid JSON: {}", index_path.display())
            })?
        } else {
            atomic_write(&index_path, b"{}")?;
            IndexMap::new()
        };

        Ok(Self { root, clones_dir, index_path, index, size_limit: CACHE_SIZE_LIMIT })
    }

    /// Overrides the storage budget (tests exercise eviction with a tiny
    /// bound).
    #[must_use]
    pub fn with_limit(mut self, bytes: u64) -> Self {
        self.size_limit = bytes;
        self
    }

    /// The cache root directory.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.root
    }

    /// Deterministic directory path for a dependency.
    #[must_use]
    pub fn dep_path(&self, dep: &Dep) -> PathBuf {
        self.clones_dir.join(dep.normalized_name()).join(dep.normalized_version())
    }

    /// True when both the directory and the index entry exist.
    #[must_use]
    pub fn has(&self, dep: &Dep) -> bool {
        self.dep_path(dep).exists() && self.index.contains_key(&dep.to_string())
    }

    /// Checks the cached directory against its index record.
    ///
    /// # Errors
    ///
    /// Returns [`ComboError::Tampered`] when directory and index presence
    /// disagree, or when the directory's size or hash differs from the
    /// record.
    pub fn validate(&self, dep: &Dep) -> Result<()> {
        let tampered = |reason: String| ComboError::Tampered { dep: dep.to_string(), reason };

        let path = self.dep_path(dep);
        let entry = self.index.get(&dep.to_string());

        let entry = match (path.exists(), entry) {
            (true, Some(entry)) => entry,
            (false, None) => {
                return Err(tampered("dependency does not exist in the cache".to_string()).into());
            }
            (dir_found, _) => {
                let (present, missing) =
                    if dir_found { ("clones directory", "index") } else { ("index", "clones directory") };
                return Err(tampered(format!(
                    "dependency is present in the {present} but missing from the {missing}"
                ))
                .into());
            }
        };

        let size = dir_size(&path)?;
        if size != entry.size {
            return Err(
                tampered(format!("expected directory size {}, found {size}", entry.size)).into()
            );
        }

        let hash = content_hash(&path)?;
        if hash != entry.hash {
            return Err(
                tampered(format!("expected directory hash {}, found {hash}", entry.hash)).into()
            );
        }

        Ok(())
    }

    /// Validates the entry and returns its path.
    pub fn get_path(&self, dep: &Dep) -> Result<PathBuf> {
        self.validate(dep)?;
        Ok(self.dep_path(dep))
    }

    /// The recorded content hash, when the dependency is cached.
    #[must_use]
    pub fn hash_of(&self, dep: &Dep) -> Option<&str> {
        self.index.get(&dep.to_string()).map(|entry| entry.hash.as_str())
    }

    /// Measures a freshly populated dependency directory and records it in
    /// the index (at the back of the insertion order).
    pub fn record(&mut self, dep: &Dep) -> Result<()> {
        let path = self.dep_path(dep);
        let entry = CacheEntry { size: dir_size(&path)?, hash: content_hash(&path)? };

        let key = dep.to_string();
        self.index.shift_remove(&key);
        self.index.insert(key, entry);
        self.persist()
    }

    /// Deletes the cached directory (if present) and drops the index entry.
    pub fn remove(&mut self, dep: &Dep) -> Result<()> {
        let path = self.dep_path(dep);
        remove_dir_all(&path)?;

        // Drop the per-library directory once its last version is gone
        if let Some(parent) = path.parent()
            && parent != self.clones_dir
            && parent.exists()
            && fs::read_dir(parent)?.next().is_none()
        {
            fs::remove_dir(parent)?;
        }

        self.index.shift_remove(&dep.to_string());
        self.persist()
    }

    /// Total size in bytes of the clones directory.
    pub fn used_storage(&self) -> Result<u64> {
        dir_size(&self.clones_dir)
    }

    /// Evicts entries oldest-first until the clones directory fits the
    /// storage budget again.
    pub fn apply_limit(&mut self) -> Result<()> {
        while self.used_storage()? > self.size_limit {
            let Some(oldest) = self.index.keys().next().cloned() else {
                // Orphan directories with no index entry; nothing left to evict.
                tracing::warn!(
                    "Cache exceeds its storage budget but the index is empty: {}",
                    self.clones_dir.display()
                );
                break;
            };

            let dep = Dep::destring(&oldest)?;
            tracing::debug!("Evicting {dep} from the cache");
            self.remove(&dep)?;
        }
        Ok(())
    }

    /// Deletes the entire cache directory.
    pub fn wipe(self) -> Result<()> {
        remove_dir_all(&self.root)
    }

    fn persist(&self) -> Result<()> {
        let contents = serde_json::to_vec_pretty(&self.index)?;
        atomic_write(&self.index_path, &contents)
    }
}
