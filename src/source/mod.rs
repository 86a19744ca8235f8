//! Source registry: mapping `(name, version)` to a fetchable source.
//!
//! The registry keeps one record per project; each project maps exact
//! versions to *version details*, a JSON record carrying a `type` field
//! (`git`, `local_path`) plus type-specific fields. A project may declare a
//! `defaults` record whose fields are merged into each version record unless
//! the version record declares its own `type`.
//!
//! Two implementations exist behind the [`SourceLocator`] seam:
//! - [`JsonSourceLocator`] - a local projects file, also writable
//!   (`add_project` / `add_version`) with atomic write-back
//! - [`HttpSourceLocator`] - a remote registry service speaking the same
//!   contract over HTTP
//!
//! [`Registry`] is the runtime choice between the two.

use crate::version::Version;
use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod http;
pub mod json;

pub use http::HttpSourceLocator;
pub use json::JsonSourceLocator;

/// Keyword selecting the lookup strategy of a project record.
pub const GENERAL_TYPE_KEYWORD: &str = "general_type";

/// The only lookup strategy currently supported: a flat version → details
/// map.
pub const DEFAULT_GENERAL_TYPE: &str = "version_dependent";

/// Keyword of the per-project defaults record.
pub const DEFAULTS_KEYWORD: &str = "defaults";

/// Keyword of the source-type tag inside version details.
pub const TYPE_KEYWORD: &str = "type";

/// Where a dependency's content comes from.
///
/// A closed tagged union: new source kinds (archive URL, registry tarball)
/// are added as new variants with their own fetch implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceDescriptor {
    /// A git repository pinned to an exact commit.
    Git {
        /// Remote URL to clone from
        url: String,
        /// Commit hash to check out (detached)
        commit_hash: String,
    },
    /// A directory on the local filesystem, copied as-is.
    LocalPath {
        /// The directory to copy
        path: PathBuf,
    },
}

/// Lookup contract of a source registry.
pub trait SourceLocator {
    /// Resolves `(name, version)` to a source descriptor.
    ///
    /// # Errors
    ///
    /// - `UndefinedProject` when the name is unknown
    /// - `UndefinedProjectVersion` when the name is known but the version is
    ///   not listed
    /// - `InvalidVersionDetails` when the record cannot be turned into a
    ///   [`SourceDescriptor`]
    fn get_source(
        &self,
        name: &str,
        version: &Version,
    ) -> impl Future<Output = Result<SourceDescriptor>>;

    /// Every version the registry lists, grouped by project name and sorted
    /// ascending.
    fn available_versions(&self) -> impl Future<Output = Result<IndexMap<String, Vec<Version>>>>;
}

/// A size/hash record from the remote registry's available-versions listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableVersion {
    /// Total size in bytes of the dependency's content
    pub size: u64,
    /// Content hash of the dependency's directory tree
    pub hash: String,
}

/// The registry implementation chosen at startup: a local projects file when
/// `--sources-json` is given, the remote service otherwise.
#[derive(Debug)]
pub enum Registry {
    /// Local projects file
    Json(JsonSourceLocator),
    /// Remote registry service
    Http(HttpSourceLocator),
}

impl SourceLocator for Registry {
    async fn get_source(&self, name: &str, version: &Version) -> Result<SourceDescriptor> {
        match self {
            Self::Json(locator) => locator.get_source(name, version).await,
            Self::Http(locator) => locator.get_source(name, version).await,
        }
    }

    async fn available_versions(&self) -> Result<IndexMap<String, Vec<Version>>> {
        match self {
            Self::Json(locator) => locator.available_versions().await,
            Self::Http(locator) => locator.available_versions().await,
        }
    }
}

impl Registry {
    /// Registers a project, optionally with a non-default general type.
    /// Idempotent when the project already exists with the same type.
    pub async fn add_project(&mut self, name: &str, general_type: Option<&str>) -> Result<()> {
        match self {
            Self::Json(locator) => locator.add_project(name, general_type),
            Self::Http(locator) => locator.add_project(name, general_type).await,
        }
    }

    /// Publishes version details for an existing project.
    pub async fn add_version(
        &mut self,
        name: &str,
        version: &Version,
        details: serde_json::Value,
    ) -> Result<()> {
        match self {
            Self::Json(locator) => locator.add_version(name, version, details),
            Self::Http(locator) => locator.add_version(name, version, details).await,
        }
    }
}
