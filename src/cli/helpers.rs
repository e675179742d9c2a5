//! Shared helper functions for CLI commands

use miette::Result;
use tracing::Span;
use ulid::Ulid;

use crate::cli::args::GlobalOpts;
use crate::core::project::Project;

/// Locate the project from `--project` or the current directory
pub fn discover_project(global: &GlobalOpts) -> Result<Project> {
    let project = match &global.project {
        Some(path) => Project::discover_from(path),
        None => Project::discover(),
    };
    project.map_err(|e| miette::miette!("{}", e))
}

/// Root span for one command invocation
///
/// Every log line emitted while the command runs carries the same `run` id.
pub fn command_span(command: &'static str) -> Span {
    let run = Ulid::new().to_string();
    tracing::info_span!("roadmap", command, run = %run)
}

/// Pluralize a count for summaries: `1 issue`, `2 issues`
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
