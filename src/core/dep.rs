//! Dependency identity.
//!
//! A [`Dep`] is the `(library-name, version)` pair that uniquely identifies a
//! fetchable artifact. Its textual form `(<name>, v<version>)` is used as the
//! key of the cache index and of the registry's available-versions listing,
//! and [`Dep::destring`] parses that form back.

use crate::core::error::ComboError;
use crate::version::Version;
use std::cmp::Ordering;
use std::fmt;

/// A `(library-name, Version)` pair uniquely identifying a fetchable
/// artifact.
///
/// Two deps are equal iff both name and version are equal. Ordering is only
/// defined within the same name (by version); comparing deps of different
/// names yields `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dep {
    /// Library name as declared in manifests and the registry
    pub name: String,
    /// Exact pinned version
    pub version: Version,
}

impl Dep {
    /// Creates a dep from a name and an already-parsed version.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self { name: name.into(), version }
    }

    /// Directory-safe form of a library name: lowercase, spaces become
    /// underscores.
    #[must_use]
    pub fn normalize_name(name: &str) -> String {
        name.to_lowercase().replace(' ', "_")
    }

    /// Directory-safe form of a version: dots become underscores.
    #[must_use]
    pub fn normalize_version(version: &Version) -> String {
        version.to_string().replace('.', "_")
    }

    /// Directory name used for this dep's library.
    #[must_use]
    pub fn normalized_name(&self) -> String {
        Self::normalize_name(&self.name)
    }

    /// Directory name used for this dep's version.
    #[must_use]
    pub fn normalized_version(&self) -> String {
        Self::normalize_version(&self.version)
    }

    /// Parses the textual form `(<name>, v<version>)` produced by `Display`.
    ///
    /// # Errors
    ///
    /// Returns [`ComboError::InvalidVersion`] when the string does not have
    /// the expected shape or the version part does not parse.
    pub fn destring(s: &str) -> Result<Self, ComboError> {
        let invalid = || ComboError::InvalidVersion { value: s.to_string() };

        let inner = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')).ok_or_else(invalid)?;
        let (name, version) = inner.split_once(", v").ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }

        Ok(Self { name: name.to_string(), version: version.parse()? })
    }
}

impl fmt::Display for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, v{})", self.name, self.version)
    }
}

impl PartialOrd for Dep {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.name == other.name { Some(self.version.cmp(&other.version)) } else { None }
    }
}
