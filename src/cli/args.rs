//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! - `--debug`: Enable debug logging
//! - `--config <path>`: Use this config file instead of the default lookup
//! - `--token <token>` / `$TRELLIS_TOKEN`: Caller credential

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Trellis - resolve commits and reconcile trees on GitHub
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file to use instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Bearer token; without one the shared application quota is used
    #[arg(long, global = true, env = "TRELLIS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the latest commit touching a path on a branch
    Resolve {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
        /// Branch name (may contain '/')
        branch: String,
        /// Path within the repository; empty means the whole branch
        #[arg(default_value = "")]
        path: String,
        /// Bypass the short-lived cache
        #[arg(long)]
        skip_cache: bool,
    },

    /// Print a tree flattened just enough to drop the given files
    Tree {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
        /// Root tree id
        root: String,
        /// Repository-relative path to drop (repeatable)
        #[arg(long = "delete", value_name = "PATH")]
        deletions: Vec<String>,
    },
}
