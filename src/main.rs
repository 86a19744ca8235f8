//! Combo CLI entry point.
//!
//! Handles command-line argument parsing, logging setup, error display, and
//! command execution. See [`combo_cli::cli`] for the available subcommands.

use anyhow::Result;
use clap::Parser;
use combo_cli::cli;
use combo_cli::core::error::user_friendly_error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // RUST_LOG wins when set; --verbose maps to debug; silent otherwise
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    } else if cli.is_verbose() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("off")
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_context = user_friendly_error(e);
            error_context.display();
            std::process::exit(1);
        }
    }
}
