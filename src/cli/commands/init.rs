//! `roadmap init` command - Initialize a new roadmap project

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use crate::cli::args::GlobalOpts;
use crate::core::project::{Project, ProjectError};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        if !global.quiet {
            println!(
                "{} Created directory {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
    }

    match Project::init(&path) {
        Ok(project) => {
            tracing::info!(root = %project.root().display(), "initialized project");
            if global.quiet {
                return Ok(());
            }
            println!(
                "{} Initialized roadmap project at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            println!();
            println!("Created project structure:");
            print_structure(project.root());
            println!();
            println!("Next steps:");
            println!("  1. Add issue files under .roadmap/issues/");
            println!(
                "  2. Run {} to load them into the cache",
                style("roadmap cache sync").yellow()
            );
            println!(
                "  3. Run {} to check tracker links",
                style("roadmap validate-links").yellow()
            );
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} Roadmap project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}

fn print_structure(root: &Path) {
    let dirs = [
        ".roadmap/",
        ".roadmap/config.yaml",
        ".roadmap/projects/",
        ".roadmap/milestones/",
        ".roadmap/issues/",
    ];

    for dir in dirs {
        let full_path = root.join(dir);
        if full_path.exists() {
            println!("  {}", style(dir).dim());
        }
    }
}
