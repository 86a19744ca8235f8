//! Global constants used throughout the combo codebase.
//!
//! Numeric limits, well-known file names, and environment variable names that
//! are used across multiple modules. Defining them centrally makes magic
//! values discoverable.

/// Name of the manifest file every combo repository carries at its root.
pub const MANIFEST_FILE_NAME: &str = "combo_manifest.json";

/// Name of the sidecar index file inside the cache directory.
pub const CACHE_INDEX_FILE_NAME: &str = "local_projects.json";

/// Name of the subdirectory of the cache that stores fetched dependencies.
pub const CLONES_DIR_NAME: &str = "clones";

/// Upper bound on the total size of the clones directory (64 MiB).
///
/// When the bound is exceeded the cache evicts entries oldest-first until the
/// total size fits again.
pub const CACHE_SIZE_LIMIT: u64 = 64 * 1024 * 1024;

/// Block size used when hashing file contents.
pub const HASH_BLOCK_SIZE: usize = 4096;

/// Environment variable overriding the cache directory location.
pub const CACHE_DIR_ENV: &str = "COMBO_CACHE_DIR";

/// Environment variable naming the remote source-registry URL.
pub const SERVER_URL_ENV: &str = "COMBO_SERVER_URL";

/// Source-registry URL used when [`SERVER_URL_ENV`] is not set.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:9999";
