//! Errors raised while syncing a single entity file

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::core::cache::EntityKind;
use crate::core::frontmatter::FrontmatterError;

/// Why one file could not be synced
///
/// The first three variants are expected skips during a batch scan; the
/// rest point at a malformed file or a broken cache.
#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("file not found: {}", path.display())]
    #[diagnostic(code(roadmap::sync::not_found))]
    NotFound { path: PathBuf },

    #[error("no frontmatter block in {}", path.display())]
    #[diagnostic(
        code(roadmap::sync::no_frontmatter),
        help("entity files must start with a `---` delimited YAML block")
    )]
    NoFrontmatter { path: PathBuf },

    #[error("{kind} '{id}' has no project_id and no default project is available")]
    #[diagnostic(
        code(roadmap::sync::unresolved_project),
        help("set project_id in the file, or sync a project first")
    )]
    UnresolvedProjectReference { kind: EntityKind, id: String },

    #[error("failed to parse {}: {source}", path.display())]
    #[diagnostic(code(roadmap::sync::parse))]
    ParseFailure {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("cache write failed: {0}")]
    #[diagnostic(code(roadmap::sync::database))]
    Database(#[from] rusqlite::Error),
}

impl SyncError {
    /// True for conditions a batch scan should skip past with a warning
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            SyncError::NotFound { .. }
                | SyncError::NoFrontmatter { .. }
                | SyncError::UnresolvedProjectReference { .. }
        )
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: impl Into<ParseError>) -> Self {
        SyncError::ParseFailure {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Cause of a [`SyncError::ParseFailure`]
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),

    #[error("field '{field}' {problem}")]
    InvalidField { field: &'static str, problem: String },
}

impl ParseError {
    pub(crate) fn invalid(field: &'static str, problem: impl Into<String>) -> Self {
        ParseError::InvalidField {
            field,
            problem: problem.into(),
        }
    }
}
