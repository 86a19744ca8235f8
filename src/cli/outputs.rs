//! The `clear-old-outputs` command: sweep materialized libraries out of a
//! directory.

use crate::manifest::Manifest;
use crate::utils::fs::{remove_dir_all, subdirectories};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Delete every combo repository under the given directory.
#[derive(Args)]
pub struct ClearOldOutputsCommand {
    /// Directory to sweep (typically a stale output directory)
    dir: PathBuf,
}

impl ClearOldOutputsCommand {
    /// Runs the command.
    pub fn execute(self) -> Result<()> {
        let mut removed = 0;
        for sub in subdirectories(&self.dir)? {
            if Manifest::is_combo_repo(&sub) {
                println!("{} {}", "Removing".yellow().bold(), sub.display());
                remove_dir_all(&sub)?;
                removed += 1;
            }
        }

        println!("Removed {removed} directories from {}", self.dir.display());
        Ok(())
    }
}
