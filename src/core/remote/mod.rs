//! Links from local issues to external trackers
//!
//! Issue files declare their remote ids in frontmatter; the cache keeps a
//! `remote_links` table of the same pairs. The validator compares the two,
//! classifies discrepancies and can repair the table.

mod declared;
mod repository;
mod validator;

pub use declared::{declared_refs, scan_declared_links, DeclaredLinks};
pub use repository::{RemoteLinkRepository, SqliteLinkRepository};
pub use validator::{
    classify, plan_fixes, DuplicateGroup, FixOptions, FixOutcome, FixPlan, LinkReport,
    LinkValidator,
};

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Backend implied by the legacy `github_issue` field
pub const GITHUB_BACKEND: &str = "github";

/// One stored `(entity, backend, remote id)` mapping
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemoteLink {
    pub entity_id: String,
    pub backend: String,
    pub remote_id: String,
}

impl RemoteLink {
    pub fn new(
        entity_id: impl Into<String>,
        backend: impl Into<String>,
        remote_id: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            backend: backend.into(),
            remote_id: remote_id.into(),
        }
    }
}

impl fmt::Display for RemoteLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}:{}", self.entity_id, self.backend, self.remote_id)
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum LinkError {
    #[error("issues directory not found: {}", path.display())]
    #[diagnostic(
        code(roadmap::links::no_issues_dir),
        help("run 'roadmap init' or check --project")
    )]
    IssuesDirMissing { path: PathBuf },

    #[error("link repository error: {0}")]
    #[diagnostic(code(roadmap::links::database))]
    Database(#[from] rusqlite::Error),
}
