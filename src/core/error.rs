//! Error handling for combo.
//!
//! The error system consists of two types:
//! - [`ComboError`] - one variant per failure mode, for precise handling in
//!   code
//! - [`ErrorContext`] - wrapper that adds a user-facing suggestion when the
//!   CLI renders a failure
//!
//! Propagation policy: `Tampered` is recovered inside the importer (evict and
//! refetch). `CorruptedDependency` is reported to the user with guidance to
//! re-resolve with `--force`. Every other error propagates to the CLI and is
//! rendered as a printed message with a non-zero exit.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for combo operations.
#[derive(Error, Debug)]
pub enum ComboError {
    /// The directory does not contain a `combo_manifest.json` file.
    #[error("\"{dir}\" is not a combo repository")]
    ManifestNotFound {
        /// Directory that was expected to hold a manifest
        dir: String,
    },

    /// The manifest file exists but is missing a required key or holds a
    /// malformed dependency record.
    #[error("Invalid manifest at \"{dir}\": {reason}")]
    InvalidManifest {
        /// Directory of the offending manifest
        dir: String,
        /// What was wrong with it
        reason: String,
    },

    /// The manifest disagrees with the identity the caller expected.
    #[error("Manifest mismatch at \"{dir}\": expected {expected}, found {found}")]
    ManifestMismatch {
        /// Directory of the offending manifest
        dir: String,
        /// Identity the caller expected
        expected: String,
        /// Identity found in the file
        found: String,
    },

    /// The source registry has no entry for the project name.
    #[error("Project {name} could not be found")]
    UndefinedProject {
        /// Requested project name
        name: String,
    },

    /// The project is known but the requested version is not listed.
    #[error("Version {version} could not be found for project {name}")]
    UndefinedProjectVersion {
        /// Requested project name
        name: String,
        /// Requested version
        version: String,
    },

    /// The registry's version record cannot be turned into a source
    /// descriptor (missing `type`, unknown variant, missing fields).
    #[error("Invalid version details for project {name}: {reason}")]
    InvalidVersionDetails {
        /// Project whose record is malformed
        name: String,
        /// What was wrong with the record
        reason: String,
    },

    /// A version string could not be parsed.
    #[error("Invalid version number format for \"{value}\"")]
    InvalidVersion {
        /// The offending version string
        value: String,
    },

    /// A live branch requires a version that is superseded by a
    /// semver-incompatible newer one.
    #[error("Dependency {older} could not be replaced by {newer}")]
    IncompatibleVersions {
        /// The older, still-required dependency
        older: String,
        /// The incompatible eliminator
        newer: String,
    },

    /// The manifest graph contains a cycle.
    #[error("Circular dependency detected: {path}")]
    CircularDependency {
        /// The dependency path from the root back to the repeated library
        path: String,
    },

    /// A fetched dependency's manifest is not valid as a library.
    #[error("Dependency {dep} is not allowed as a library: {reason}")]
    NotAllowedDependency {
        /// The offending dependency
        dep: String,
        /// Why it is not allowed
        reason: String,
    },

    /// A cache entry disagrees with its index record (size, hash, or
    /// presence). Recovered locally by eviction and refetch.
    #[error("Cache entry for {dep} was manually edited: {reason}")]
    Tampered {
        /// The dependency whose cache entry is inconsistent
        dep: String,
        /// The observed inconsistency
        reason: String,
    },

    /// A dependency in the output directory no longer matches the canonical
    /// cached content.
    #[error("Dependency \"{name}\" was modified in the output directory")]
    CorruptedDependency {
        /// Library name of the modified dependency
        name: String,
    },

    /// A `local_path` source points at a path that does not exist.
    #[error("Local path {path} does not exist")]
    NonExistingLocalPath {
        /// The missing path
        path: String,
    },

    /// The remote source registry could not be reached.
    #[error("Could not reach the source registry at {url}: {reason}")]
    ServerConnectionError {
        /// Registry URL
        url: String,
        /// Transport-level failure description
        reason: String,
    },

    /// The remote source registry answered with a non-success response.
    #[error("The source registry rejected the request: {reason}")]
    NackFromServer {
        /// Response body or status line
        reason: String,
    },

    /// Git operation failed during execution.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g., "clone", "checkout")
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// Git executable not found in PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Programmer-error sentinel for states that should be unreachable.
    #[error("Unhandled combo error: {message}")]
    UnhandledCombo {
        /// Description of the unexpected state
        message: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization error wrapper.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Semantic version parsing error wrapper.
    #[error("Semver error: {0}")]
    SemverError(#[from] semver::Error),
}

/// User-facing error wrapper rendered by the CLI on failure.
///
/// Carries the underlying error plus an optional actionable suggestion and
/// optional details. Suggestions are displayed in green to draw attention.
pub struct ErrorContext {
    /// The underlying error
    pub error: anyhow::Error,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub fn new(error: anyhow::Error) -> Self {
        Self { error, suggestion: None, details: None }
    }

    /// Add a suggestion for resolving the error.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details about the error.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.error);

        for cause in self.error.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".yellow(), cause);
        }

        if let Some(details) = &self.details {
            eprintln!("\n{details}");
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("\n{} {}", "suggestion:".green().bold(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nsuggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Convert any error into a user-friendly [`ErrorContext`] with an
/// actionable suggestion where one is known.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let suggestion = match error.downcast_ref::<ComboError>() {
        Some(ComboError::ManifestNotFound { .. }) => {
            Some("Create a combo_manifest.json file in the project directory".to_string())
        }
        Some(ComboError::CorruptedDependency { name }) => Some(format!(
            "Dependency \"{name}\" was edited in place; run 'combo resolve --force' to overwrite \
             local changes"
        )),
        Some(ComboError::GitNotFound) => {
            Some("Install git from https://git-scm.com/ and make sure it is in PATH".to_string())
        }
        Some(ComboError::ServerConnectionError { .. }) => Some(
            "Check the registry URL (COMBO_SERVER_URL) or pass --sources-json to use a local \
             projects file"
                .to_string(),
        ),
        Some(ComboError::CircularDependency { .. }) => {
            Some("Break the cycle by removing one of the dependencies along the path".to_string())
        }
        _ => None,
    };

    let mut context = ErrorContext::new(error);
    if let Some(suggestion) = suggestion {
        context = context.with_suggestion(suggestion);
    }
    context
}
