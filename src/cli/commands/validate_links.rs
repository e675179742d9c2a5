//! `roadmap validate-links` command - Reconcile remote tracker links
//!
//! Compares the remote ids declared in issue frontmatter with the cache's
//! `remote_links` table. Exits with status 1 when the issues directory is
//! missing or when declared links are still absent from the cache after the
//! run, so it can gate CI.

use console::style;
use miette::Result;

use crate::cli::args::GlobalOpts;
use crate::cli::helpers::{command_span, discover_project, plural};
use crate::core::cache::EntityCache;
use crate::core::config::Config;
use crate::core::remote::{
    scan_declared_links, FixOptions, FixOutcome, LinkError, LinkReport, LinkValidator,
};

#[derive(clap::Args, Debug)]
pub struct ValidateLinksArgs {
    /// Insert missing links and remove duplicates
    #[arg(long)]
    pub auto_fix: bool,

    /// Show what --auto-fix would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// With --auto-fix, also remove links that no issue file declares
    #[arg(long)]
    pub prune: bool,

    /// Only check this backend (default: config, else every backend found)
    #[arg(long)]
    pub backend: Option<String>,
}

pub fn run(args: ValidateLinksArgs, global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let config = Config::load(Some(&project));
    let span = command_span("validate-links");

    let declared = match scan_declared_links(&project.issues_dir(), &span) {
        Ok(declared) => declared,
        Err(e @ LinkError::IssuesDirMissing { .. }) => {
            eprintln!("{} {}", style("✗").red(), e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let mut cache = EntityCache::open(&project)?;
    let mut validator = LinkValidator::new(cache.remote_links(), declared, span);

    let backends = match args.backend.clone().or(config.default_backend) {
        Some(backend) => vec![backend],
        None => validator.backends()?,
    };

    if backends.is_empty() {
        if !global.quiet {
            println!(
                "{} No remote links declared or stored",
                style("✓").green()
            );
        }
        return Ok(());
    }

    let fixing = args.auto_fix || args.dry_run;
    let options = FixOptions {
        dry_run: args.dry_run,
        prune: args.prune,
    };

    let mut remaining_missing = 0;
    for backend in &backends {
        if fixing {
            let outcome = validator.auto_fix(backend, options)?;
            if !global.quiet {
                print_report(&outcome.before, global.verbose);
                print_fix(&outcome, global.verbose);
            }
            remaining_missing += outcome.after.missing_in_cache.len();
        } else {
            let report = validator.validate(backend)?;
            if !global.quiet {
                print_report(&report, global.verbose);
            }
            remaining_missing += report.missing_in_cache.len();
        }
    }

    if remaining_missing > 0 {
        if !global.quiet {
            println!();
            println!(
                "{} {} missing from the cache",
                style("✗").red(),
                plural(remaining_missing, "declared link")
            );
            if !args.auto_fix || args.dry_run {
                println!(
                    "  Run {} to repair",
                    style("roadmap validate-links --auto-fix").yellow()
                );
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

fn print_report(report: &LinkReport, verbose: bool) {
    println!();
    println!("{} {}", style("Backend").bold(), style(&report.backend).cyan());
    println!("{}", style("─".repeat(40)).dim());

    if report.is_clean() {
        println!("  {} All links consistent", style("✓").green());
        return;
    }

    print_ids("Missing in cache", &report.missing_in_cache, verbose);
    print_ids("Extra in cache", &report.extra_in_cache, verbose);

    if !report.duplicates.is_empty() {
        println!(
            "  {:<17} {}",
            "Duplicates:",
            style(report.duplicates.len()).red()
        );
        if verbose {
            for group in &report.duplicates {
                println!(
                    "    {} -> {}",
                    style(&group.remote_id).yellow(),
                    group.entity_ids.join(", ")
                );
            }
        }
    }
}

fn print_ids(label: &str, ids: &[String], verbose: bool) {
    if ids.is_empty() {
        return;
    }
    println!("  {:<17} {}", format!("{}:", label), style(ids.len()).yellow());
    if verbose {
        for id in ids {
            println!("    {}", id);
        }
    }
}

fn print_fix(outcome: &FixOutcome, verbose: bool) {
    let plan = &outcome.plan;
    if plan.is_empty() {
        println!("  {} Nothing to fix", style("✓").green());
        return;
    }

    let verb = if outcome.dry_run { "Would" } else { "Did" };
    println!(
        "  {} {} add {}, remove {} duplicate(s), prune {}",
        style("→").blue(),
        verb,
        plural(plan.to_link.len(), "link"),
        plan.dedup.len(),
        plural(plan.prune.len(), "link"),
    );
    if verbose {
        for link in &plan.to_link {
            println!("    + {}", link);
        }
        for link in plan.removals() {
            println!("    - {}", link);
        }
    }

    if !outcome.dry_run && !outcome.after.duplicates.is_empty() {
        println!(
            "  {} {} remain; run again to resolve",
            style("!").yellow(),
            plural(outcome.after.duplicates.len(), "duplicate group")
        );
    }
}
