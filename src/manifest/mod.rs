//! Manifest (`combo_manifest.json`) parsing and validation.
//!
//! Every combo repository carries a manifest at its root declaring the
//! project name, its exact version, and the list of direct dependencies.
//! A manifest that additionally declares `output_directory` is valid as the
//! root of a resolution (the directory the resolved set is materialized
//! into); all manifests are currently valid as libraries.
//!
//! ```json
//! {
//!   "name": "My Project",
//!   "version": "1.0",
//!   "dependencies": [ { "name": "Lib A", "version": "1.7" } ],
//!   "output_directory": "contrib"
//! }
//! ```

use crate::constants::MANIFEST_FILE_NAME;
use crate::core::dep::Dep;
use crate::core::error::ComboError;
use crate::version::Version;
use anyhow::Result;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// A dependency record declared in a manifest: exact name and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    /// Library name as known to the source registry
    pub name: String,
    /// Exact pinned version
    pub version: Version,
}

impl DeclaredDependency {
    /// The [`Dep`] identity of this record.
    #[must_use]
    pub fn as_dep(&self) -> Dep {
        Dep::new(self.name.clone(), self.version.clone())
    }
}

/// What identity the caller expects the loaded manifest to have.
#[derive(Debug, Clone, Copy)]
pub enum Expected<'a> {
    /// Loading the root project; no identity check.
    Root,
    /// Loading a fetched dependency; name and version must match.
    Dep(&'a Dep),
    /// Loading by directory; the basename must equal the normalized name.
    DirName,
    /// No identity check at all (e.g. publishing from a working copy).
    Any,
}

/// Read-only snapshot of a `combo_manifest.json` file.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Declared project name
    pub name: String,
    /// Declared project version
    pub version: Version,
    /// Direct dependencies in declaration order
    pub dependencies: Vec<DeclaredDependency>,
    output_directory: Option<String>,
    base_dir: PathBuf,
    raw: Value,
}

impl Manifest {
    /// Loads and validates the manifest of `dir`.
    ///
    /// # Errors
    ///
    /// - [`ComboError::ManifestNotFound`] when the file is missing
    /// - [`ComboError::InvalidManifest`] when a required key is missing or a
    ///   dependency record is malformed
    /// - [`ComboError::ManifestMismatch`] when the file disagrees with
    ///   `expected`
    pub fn load(dir: &Path, expected: Expected<'_>) -> Result<Self> {
        let file_path = dir.join(MANIFEST_FILE_NAME);
        if !file_path.exists() {
            return Err(ComboError::ManifestNotFound { dir: dir.display().to_string() }.into());
        }

        let invalid = |reason: String| ComboError::InvalidManifest {
            dir: dir.display().to_string(),
            reason,
        };

        let contents = fs::read_to_string(&file_path)?;
        let raw: Value =
            serde_json::from_str(&contents).map_err(|e| invalid(format!("not valid JSON: {e}")))?;

        let object =
            raw.as_object().ok_or_else(|| invalid("top level is not an object".to_string()))?;

        for keyword in ["name", "version", "dependencies"] {
            if !object.contains_key(keyword) {
                return Err(invalid(format!("missing keyword \"{keyword}\"")).into());
            }
        }

        let name = object["name"]
            .as_str()
            .ok_or_else(|| invalid("\"name\" is not a string".to_string()))?
            .to_string();

        let version_str = object["version"]
            .as_str()
            .ok_or_else(|| invalid("\"version\" is not a string".to_string()))?;
        let version = Version::parse(version_str)
            .map_err(|_| invalid(format!("invalid version \"{version_str}\"")))?;

        let records = object["dependencies"]
            .as_array()
            .ok_or_else(|| invalid("\"dependencies\" is not a list".to_string()))?;

        let mut dependencies = Vec::with_capacity(records.len());
        for record in records {
            let malformed = || invalid(format!("dependency \"{record}\" is malformed"));

            let dep_name = record.get("name").and_then(Value::as_str).ok_or_else(malformed)?;
            let dep_version_str =
                record.get("version").and_then(Value::as_str).ok_or_else(malformed)?;
            let dep_version = Version::parse(dep_version_str).map_err(|_| malformed())?;

            dependencies.push(DeclaredDependency {
                name: dep_name.to_string(),
                version: dep_version,
            });
        }

        let output_directory = match object.get("output_directory") {
            Some(value) => Some(
                value
                    .as_str()
                    .ok_or_else(|| invalid("\"output_directory\" is not a string".to_string()))?
                    .to_string(),
            ),
            None => None,
        };

        let manifest = Self {
            name,
            version,
            dependencies,
            output_directory,
            base_dir: dir.to_path_buf(),
            raw,
        };
        manifest.validate(dir, expected)?;
        Ok(manifest)
    }

    fn validate(&self, dir: &Path, expected: Expected<'_>) -> Result<()> {
        let mismatch = |expected: String, found: String| ComboError::ManifestMismatch {
            dir: dir.display().to_string(),
            expected,
            found,
        };

        match expected {
            Expected::Root | Expected::Any => {}
            Expected::Dep(dep) => {
                if self.name != dep.name || self.version != dep.version {
                    return Err(mismatch(dep.to_string(), self.as_dep().to_string()).into());
                }
            }
            Expected::DirName => {
                let basename =
                    dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
                if Dep::normalize_name(&self.name) != basename {
                    return Err(mismatch(basename, self.name.clone()).into());
                }
            }
        }
        Ok(())
    }

    /// True unless the directory is missing a manifest file entirely.
    ///
    /// A directory holding an invalid or mismatching manifest is still a
    /// combo repository; only [`ComboError::ManifestNotFound`] means it is
    /// not.
    #[must_use]
    pub fn is_combo_repo(dir: &Path) -> bool {
        match Self::load(dir, Expected::DirName) {
            Ok(_) => true,
            Err(e) => !matches!(
                e.downcast_ref::<ComboError>(),
                Some(ComboError::ManifestNotFound { .. })
            ),
        }
    }

    /// The declared direct dependencies as [`Dep`] identities.
    #[must_use]
    pub fn sons(&self) -> Vec<Dep> {
        self.dependencies.iter().map(DeclaredDependency::as_dep).collect()
    }

    /// A manifest is valid as a resolution root iff it declares
    /// `output_directory`.
    #[must_use]
    pub fn valid_as_root(&self) -> bool {
        self.output_directory.is_some()
    }

    /// A manifest is currently always valid as a library.
    #[must_use]
    pub fn valid_as_lib(&self) -> bool {
        true
    }

    /// Absolute path of the output directory, when declared.
    #[must_use]
    pub fn output_dir(&self) -> Option<PathBuf> {
        self.output_directory.as_ref().map(|rel| self.base_dir.join(rel))
    }

    /// The directory this manifest was loaded from.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The [`Dep`] identity declared by this manifest.
    #[must_use]
    pub fn as_dep(&self) -> Dep {
        Dep::new(self.name.clone(), self.version.clone())
    }
}

/// Deep equality of the parsed manifest documents.
impl PartialEq for Manifest {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Manifest {}
