//! cli
//!
//! Command-line interface layer for Trellis.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the log subscriber
//! - Delegate to [`crate::Trellis`] and print results as JSON
//!
//! The CLI layer is thin; everything it prints comes from the library.

pub mod args;

pub use args::{Cli, Command};

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::forge::Credential;
use crate::Trellis;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub async fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.debug);

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    match config.path() {
        Some(path) => debug!(path = %path.display(), "loaded configuration"),
        None => debug!("no configuration file; using defaults"),
    }
    let trellis = Trellis::from_config(&config);
    let credential = cli.token.map(Credential::bearer);

    let output = match cli.command {
        Command::Resolve {
            owner,
            repo,
            branch,
            path,
            skip_cache,
        } => {
            let result = trellis
                .resolve_commit(&owner, &repo, &branch, &path, skip_cache, credential.as_ref())
                .await
                .with_context(|| format!("failed to resolve {}/{}@{}", owner, repo, branch))?;
            serde_json::to_string_pretty(&result)?
        }
        Command::Tree {
            owner,
            repo,
            root,
            deletions,
        } => {
            let tree = trellis
                .reconcile_tree_with_deletions(
                    &owner,
                    &repo,
                    &root,
                    deletions.as_slice(),
                    credential.as_ref(),
                )
                .await
                .with_context(|| format!("failed to reconcile tree {}", root))?;
            serde_json::to_string_pretty(&tree)?
        }
    };

    println!("{}", output);
    Ok(())
}

/// Install a stderr fmt subscriber.
///
/// `--debug` forces debug output for this crate; otherwise `RUST_LOG`
/// applies, defaulting to warnings only.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("trellis=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
