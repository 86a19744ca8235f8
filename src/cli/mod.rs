//! Command-line interface implementation.
//!
//! Subcommands:
//! - `resolve` - fetch, resolve, and materialize the project's dependencies
//! - `is-dirty` - report disagreements between the output directory and the
//!   manifest graph
//! - `check-for-updates` - list dependencies with newer registry versions
//! - `delete-cache` - remove the per-user dependency cache
//! - `clear-old-outputs` - sweep combo repositories out of a directory
//! - `upload` - publish the working copy's version details to the registry
//!
//! Commands that consult the source registry accept `--sources-json` to use
//! a local projects file; otherwise the remote registry named by
//! `COMBO_SERVER_URL` is used.

use crate::cache::Cache;
use crate::constants::{DEFAULT_SERVER_URL, SERVER_URL_ENV};
use crate::source::{HttpSourceLocator, JsonSourceLocator, Registry};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;

pub mod outputs;
pub mod resolve;
pub mod status;
pub mod updates;
pub mod upload;

/// Top-level CLI definition.
#[derive(Parser)]
#[command(
    name = "combo",
    version,
    about = "Source-dependency manager for multi-repository projects"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, resolve, and materialize the project's dependencies
    Resolve(resolve::ResolveCommand),
    /// Report whether the output directory disagrees with the manifest graph
    IsDirty(status::IsDirtyCommand),
    /// List dependencies with newer versions available in the registry
    CheckForUpdates(updates::CheckForUpdatesCommand),
    /// Delete the per-user dependency cache
    DeleteCache,
    /// Delete every combo repository under the given directory
    ClearOldOutputs(outputs::ClearOldOutputsCommand),
    /// Publish the working copy's version details to the registry
    Upload(upload::UploadCommand),
}

impl Cli {
    /// Whether verbose logging was requested.
    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Runs the selected subcommand.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Resolve(command) => command.execute().await,
            Commands::IsDirty(command) => command.execute().await,
            Commands::CheckForUpdates(command) => command.execute().await,
            Commands::DeleteCache => {
                let cache = Cache::open()?;
                let location = cache.location().to_path_buf();
                cache.wipe()?;
                println!("Deleted the dependency cache at {}", location.display());
                Ok(())
            }
            Commands::ClearOldOutputs(command) => command.execute(),
            Commands::Upload(command) => command.execute().await,
        }
    }
}

/// The registry implementation selected by the command line: a local
/// projects file when given, the remote service otherwise.
pub(crate) fn build_registry(sources_json: Option<&Path>) -> Result<Registry> {
    match sources_json {
        Some(path) => Ok(Registry::Json(JsonSourceLocator::load(path)?)),
        None => {
            let url = std::env::var(SERVER_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
            Ok(Registry::Http(HttpSourceLocator::new(&url)))
        }
    }
}
