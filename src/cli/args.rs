//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::{cache::CacheCommands, init::InitArgs, validate_links::ValidateLinksArgs};

#[derive(Parser)]
#[command(name = "roadmap")]
#[command(author, version, about = "File-backed issue and milestone tracker")]
#[command(long_about = "Issues, milestones and projects live as Markdown files with YAML frontmatter under .roadmap/. A local SQLite cache mirrors them and tracks links to external trackers.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output and debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .roadmap/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new roadmap project
    Init(InitArgs),

    /// Manage the entity cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Check remote tracker links against the issue files
    ValidateLinks(ValidateLinksArgs),
}
