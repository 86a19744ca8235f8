//! The `check-for-updates` command: compare the root manifest against the
//! registry's available-versions listing.

use crate::cli::build_registry;
use crate::manifest::{Expected, Manifest};
use crate::source::SourceLocator;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// List dependencies with newer versions available in the registry.
#[derive(Args)]
pub struct CheckForUpdatesCommand {
    /// Project directory holding the root manifest
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Use a local projects file instead of the remote registry
    #[arg(long)]
    sources_json: Option<PathBuf>,
}

impl CheckForUpdatesCommand {
    /// Runs the command.
    pub async fn execute(self) -> Result<()> {
        let registry = build_registry(self.sources_json.as_deref())?;
        let manifest = Manifest::load(&self.path, Expected::Root)?;
        let listing = registry.available_versions().await?;

        let mut updates = 0;
        for dep in manifest.sons() {
            let Some(versions) = listing.get(&dep.name) else {
                continue;
            };
            if let Some(latest) = versions.last()
                && *latest > dep.version
            {
                updates += 1;
                println!("{}: {} {} {latest}", dep.name.bold(), dep.version, "->".dimmed());
            }
        }

        if updates == 0 {
            println!("All dependencies are up-to-date");
        } else {
            println!("{updates} dependencies have newer versions available");
        }
        Ok(())
    }
}
