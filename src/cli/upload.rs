//! The `upload` command: publish a library working copy to the registry.
//!
//! Reads the working copy's manifest for its `(name, version)` identity,
//! derives version details from the working directory (for `git` sources:
//! the origin remote URL and HEAD commit), and registers both the project
//! and the version with the configured registry.

use crate::cli::build_registry;
use crate::core::dep::Dep;
use crate::importer::SourceDetailsProvider;
use crate::manifest::{Expected, Manifest};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Publish the working copy's version details to the registry.
#[derive(Args)]
pub struct UploadCommand {
    /// Library working copy to publish
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Use a local projects file instead of the remote registry
    #[arg(long)]
    sources_json: Option<PathBuf>,

    /// Source type to derive version details from
    #[arg(long, default_value = "git")]
    source_type: String,
}

impl UploadCommand {
    /// Runs the command.
    pub async fn execute(self) -> Result<()> {
        let mut registry = build_registry(self.sources_json.as_deref())?;
        let manifest = Manifest::load(&self.path, Expected::Any)?;

        let details = SourceDetailsProvider::new(&self.path).details(&self.source_type).await?;

        registry.add_project(&manifest.name, None).await?;
        registry.add_version(&manifest.name, &manifest.version, details).await?;

        let published = Dep::new(manifest.name, manifest.version);
        println!("{} {published} to the registry", "Published".green().bold());
        Ok(())
    }
}
