//! Cache type definitions
//!
//! Row types for the derived cache and the statistics reported by syncs.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::core::frontmatter::Frontmatter;

// =========================================================================
// Entity kinds
// =========================================================================

/// The three kinds of entity file the cache mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Project,
    Milestone,
    Issue,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Milestone => "milestone",
            EntityKind::Issue => "issue",
        }
    }

    /// Cache table holding rows of this kind
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Project => "projects",
            EntityKind::Milestone => "milestones",
            EntityKind::Issue => "issues",
        }
    }

    /// Sub-directory of `.roadmap/` holding files of this kind
    pub fn directory(&self) -> &'static str {
        self.table()
    }

    /// Sync order: projects before the milestones and issues that reference them
    pub fn sync_order() -> [EntityKind; 3] {
        [EntityKind::Project, EntityKind::Milestone, EntityKind::Issue]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(EntityKind::Project),
            "milestone" => Ok(EntityKind::Milestone),
            "issue" => Ok(EntityKind::Issue),
            _ => Err(format!("Unknown entity kind: {}", s)),
        }
    }
}

// =========================================================================
// Synced records
// =========================================================================

/// Cached issue row
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRecord {
    pub id: String,
    pub project_id: String,
    pub milestone_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub issue_type: String,
    pub assignee: Option<String>,
    pub estimate_hours: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
    /// Frontmatter fields without a typed column
    pub extra: Frontmatter,
}

/// Cached milestone row
#[derive(Debug, Clone, PartialEq)]
pub struct MilestoneRecord {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
    pub progress_percentage: f64,
    pub extra: Frontmatter,
}

/// Cached project row
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub extra: Frontmatter,
}

/// Last observed state of a synced file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSyncState {
    /// Absolute path of the file
    pub file_path: String,
    pub content_hash: String,
    pub file_size: u64,
    pub last_modified: DateTime<Utc>,
    /// Entity written from this file, when recorded by a coordinator
    pub entity: Option<(EntityKind, String)>,
}

// =========================================================================
// Statistics
// =========================================================================

/// Result of a batch sync
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    pub files_scanned: usize,
    pub synced: usize,
    /// Files skipped because their hash and size were unchanged
    pub unchanged: usize,
    pub failed: usize,
    /// Rows removed because their source file disappeared
    pub removed: usize,
    pub duration_ms: u64,
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    pub by_kind: HashMap<EntityKind, usize>,
    pub tracked_files: usize,
    pub remote_links: usize,
    pub db_size_bytes: u64,
}

impl CacheStats {
    pub fn count(&self, kind: EntityKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}
