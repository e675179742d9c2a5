//! `roadmap cache` command - Manage the entity cache
//!
//! The cache is a local SQLite database that stores:
//! - Projects, milestones and issues parsed from their Markdown files
//! - The hash, size and mtime of every synced file
//! - Links from issues to external trackers
//!
//! The cache is user-local (gitignored) and can be rebuilt from the files at
//! any time. Remote links are the exception: they survive `rebuild` and
//! `clear`, and are maintained by `roadmap validate-links`.

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::args::GlobalOpts;
use crate::cli::helpers::{command_span, discover_project};
use crate::core::cache::{EntityCache, EntityKind, SyncStats};
use crate::core::config::Config;

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Sync the cache with the entity files
    Sync,

    /// Drop every file-derived row and sync from scratch
    Rebuild,

    /// Show cache statistics
    Status,

    /// Delete every file-derived row (remote links are kept)
    Clear,
}

pub fn run(cmd: CacheCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CacheCommands::Sync => run_sync(global),
        CacheCommands::Rebuild => run_rebuild(global),
        CacheCommands::Status => run_status(global),
        CacheCommands::Clear => run_clear(global),
    }
}

fn run_sync(global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let config = Config::load(Some(&project));
    let mut cache = EntityCache::open(&project)?;

    let stats = cache.sync_all(
        &project,
        config.project_fallback(),
        config.resync(),
        command_span("cache sync"),
    )?;

    if !global.quiet {
        if stats.synced == 0 && stats.failed == 0 && stats.removed == 0 {
            println!("{} Cache is up to date", style("✓").green());
        } else {
            println!(
                "{} Cache synced in {}ms",
                style("✓").green(),
                stats.duration_ms
            );
        }
        print_stats(&stats);
    }

    Ok(())
}

fn run_rebuild(global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let config = Config::load(Some(&project));
    let mut cache = EntityCache::open(&project)?;

    if !global.quiet {
        println!("{} Rebuilding cache...", style("→").blue());
    }
    let stats = cache.rebuild(&project, config.project_fallback(), command_span("cache rebuild"))?;

    if !global.quiet {
        println!(
            "{} Cache rebuilt in {}ms",
            style("✓").green(),
            stats.duration_ms
        );
        print_stats(&stats);
    }

    Ok(())
}

fn print_stats(stats: &SyncStats) {
    println!("  Files scanned: {}", stats.files_scanned);
    if stats.synced > 0 {
        println!("  Synced:        {}", style(stats.synced).green());
    }
    if stats.unchanged > 0 {
        println!("  Unchanged:     {}", style(stats.unchanged).dim());
    }
    if stats.removed > 0 {
        println!("  Removed:       {}", style(stats.removed).yellow());
    }
    if stats.failed > 0 {
        println!(
            "  Failed:        {} (run with --verbose for details)",
            style(stats.failed).red()
        );
    }
}

fn run_status(global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let cache = EntityCache::open(&project)?;

    let stats = cache.statistics()?;

    println!("{}", style("Cache Status").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!(
        "  Location:      {}",
        project.roadmap_dir().join("cache.db").display()
    );
    for kind in EntityKind::sync_order() {
        println!(
            "  {:<14} {}",
            format!("{}s:", capitalize(kind.as_str())),
            style(stats.count(kind)).cyan()
        );
    }
    println!("  Tracked files: {}", style(stats.tracked_files).cyan());
    println!("  Remote links:  {}", style(stats.remote_links).cyan());
    println!(
        "  Database size: {} KB",
        style(stats.db_size_bytes / 1024).cyan()
    );

    Ok(())
}

fn run_clear(global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let mut cache = EntityCache::open(&project)?;
    cache.clear()?;

    if !global.quiet {
        println!("{} Cache cleared", style("✓").green());
        println!(
            "  Run {} to repopulate",
            style("roadmap cache sync").yellow()
        );
    }

    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
