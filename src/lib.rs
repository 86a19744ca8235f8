//! Combo - a source-dependency manager for multi-repository projects.
//!
//! A root project's `combo_manifest.json` pins named library dependencies at
//! exact versions. Combo transitively fetches every required library through
//! a pluggable source registry, converges on a single version per library,
//! and materializes the surviving set as sibling directories under the
//! root's output directory.
//!
//! # Architecture
//!
//! Data flows root manifest → tree build (recursive fetch through the
//! importer, memoized by the cache) → resolution (prune the tree to one
//! version per library) → reconciliation (diff against the output directory,
//! copy or delete).
//!
//! # Core Modules
//!
//! - [`cache`] - content-addressed store of fetched dependencies with a
//!   bounded size
//! - [`cli`] - command-line interface implementation
//! - [`core`] - dependency identity and error handling
//! - [`git`] - git operations wrapper using the system git command
//! - [`importer`] - fetch dispatch over source-descriptor variants
//! - [`manager`] - orchestration and output-directory reconciliation
//! - [`manifest`] - `combo_manifest.json` parsing and validation
//! - [`resolver`] - dependency tree and version-conflict resolution
//! - [`source`] - source registry lookup (local JSON file or remote service)
//! - [`utils`] - cross-platform filesystem helpers
//! - [`version`] - version parsing, ordering, and caret compatibility
//!
//! # Example
//!
//! ```json
//! {
//!   "name": "My Project",
//!   "version": "1.0",
//!   "dependencies": [ { "name": "Lib A", "version": "1.7" } ],
//!   "output_directory": "contrib"
//! }
//! ```
//!
//! ```bash
//! # Fetch, resolve, and materialize dependencies
//! combo resolve
//!
//! # Check whether the output directory is stale
//! combo is-dirty
//! ```

pub mod cache;
pub mod cli;
pub mod constants;
pub mod core;
pub mod git;
pub mod importer;
pub mod manager;
pub mod manifest;
pub mod resolver;
pub mod source;
pub mod utils;
pub mod version;
