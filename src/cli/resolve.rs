//! The `resolve` command: root manifest → tree → resolution → output
//! directory.

use crate::cache::Cache;
use crate::cli::build_registry;
use crate::manager::DependenciesManager;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Fetch, resolve, and materialize the project's dependencies.
#[derive(Args)]
pub struct ResolveCommand {
    /// Overwrite corrupted dependencies instead of aborting
    #[arg(long)]
    force: bool,

    /// Project directory holding the root manifest
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Use a local projects file instead of the remote registry
    #[arg(long)]
    sources_json: Option<PathBuf>,
}

impl ResolveCommand {
    /// Runs the command.
    pub async fn execute(self) -> Result<()> {
        let registry = build_registry(self.sources_json.as_deref())?;
        let cache = Cache::open()?;
        let mut manager = DependenciesManager::new(&self.path, registry, cache)?;

        let changed = manager.resolve(self.force).await?;
        manager.cleanup()?;

        if changed {
            println!("{} resolved all dependencies", "Successfully".green().bold());
        }
        Ok(())
    }
}
