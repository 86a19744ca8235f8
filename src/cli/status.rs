//! The `is-dirty` command: report the output directory's health.

use crate::cache::Cache;
use crate::cli::build_registry;
use crate::manager::DependenciesManager;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// Report whether the output directory disagrees with the manifest graph.
#[derive(Args)]
pub struct IsDirtyCommand {
    /// Project directory holding the root manifest
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Use a local projects file instead of the remote registry
    #[arg(long)]
    sources_json: Option<PathBuf>,
}

impl IsDirtyCommand {
    /// Runs the command.
    pub async fn execute(self) -> Result<()> {
        let registry = build_registry(self.sources_json.as_deref())?;
        let cache = Cache::open()?;
        let mut manager = DependenciesManager::new(&self.path, registry, cache)?;

        // Corruption suppresses dirtiness; is_dirty reports it on its own
        if !manager.is_dirty().await? {
            println!("The repository is not dirty, no need to resolve");
            return Ok(());
        }

        println!("The repository is dirty");
        println!("Use 'combo resolve' to update unresolved dependencies");
        let mismatches = manager.dirty_mismatches().await?;
        for mismatch in &mismatches {
            println!("\t{mismatch}");
        }
        Ok(())
    }
}
