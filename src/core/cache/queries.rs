//! Query methods for retrieving cached rows

use std::path::Path;

use chrono::{DateTime, Utc};
use miette::{IntoDiagnostic, Result};
use rusqlite::{params, OptionalExtension};

use super::{EntityCache, EntityKind, FileSyncState, IssueRecord, MilestoneRecord, ProjectRecord};
use crate::core::frontmatter::Frontmatter;
use crate::core::sync::absolute_path;

impl EntityCache {
    /// Get a cached issue by exact id
    pub fn get_issue(&self, id: &str) -> Option<IssueRecord> {
        self.conn
            .query_row(
                r#"SELECT id, project_id, milestone_id, title, description, status, priority,
                          issue_type, assignee, estimate_hours, due_date, metadata
                   FROM issues WHERE id = ?1"#,
                params![id],
                |row| {
                    Ok(IssueRecord {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                        milestone_id: row.get(2)?,
                        title: row.get(3)?,
                        description: row.get(4)?,
                        status: row.get(5)?,
                        priority: row.get(6)?,
                        issue_type: row.get(7)?,
                        assignee: row.get(8)?,
                        estimate_hours: row.get(9)?,
                        due_date: parse_datetime(row.get(10)?),
                        extra: parse_metadata(row.get(11)?),
                    })
                },
            )
            .optional()
            .ok()
            .flatten()
    }

    /// Get a cached milestone by exact id
    pub fn get_milestone(&self, id: &str) -> Option<MilestoneRecord> {
        self.conn
            .query_row(
                r#"SELECT id, project_id, title, description, status, due_date,
                          progress_percentage, metadata
                   FROM milestones WHERE id = ?1"#,
                params![id],
                |row| {
                    Ok(MilestoneRecord {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                        title: row.get(2)?,
                        description: row.get(3)?,
                        status: row.get(4)?,
                        due_date: parse_datetime(row.get(5)?),
                        progress_percentage: row.get(6)?,
                        extra: parse_metadata(row.get(7)?),
                    })
                },
            )
            .optional()
            .ok()
            .flatten()
    }

    /// Get a cached project by exact id
    pub fn get_project(&self, id: &str) -> Option<ProjectRecord> {
        self.conn
            .query_row(
                "SELECT id, name, description, status, metadata FROM projects WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ProjectRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        status: row.get(3)?,
                        extra: parse_metadata(row.get(4)?),
                    })
                },
            )
            .optional()
            .ok()
            .flatten()
    }

    /// Ids of every cached row of `kind`, sorted
    pub fn list_ids(&self, kind: EntityKind) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id FROM {} ORDER BY id", kind.table()))
            .into_diagnostic()?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .into_diagnostic()?
            .collect::<rusqlite::Result<Vec<String>>>()
            .into_diagnostic()?;
        Ok(ids)
    }

    /// Recorded sync state for a file
    pub fn get_sync_state(&self, path: &Path) -> Option<FileSyncState> {
        self.conn
            .query_row(
                r#"SELECT file_path, content_hash, file_size, last_modified, entity_kind, entity_id
                   FROM file_sync_state WHERE file_path = ?1"#,
                params![absolute_path(path)],
                sync_state_from_row,
            )
            .optional()
            .ok()
            .flatten()
    }

    /// Every recorded sync state
    pub fn sync_states(&self) -> Result<Vec<FileSyncState>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"SELECT file_path, content_hash, file_size, last_modified, entity_kind, entity_id
                   FROM file_sync_state ORDER BY file_path"#,
            )
            .into_diagnostic()?;
        let states = stmt
            .query_map([], sync_state_from_row)
            .into_diagnostic()?
            .collect::<rusqlite::Result<Vec<_>>>()
            .into_diagnostic()?;
        Ok(states)
    }
}

fn sync_state_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileSyncState> {
    let kind: Option<String> = row.get(4)?;
    let entity_id: Option<String> = row.get(5)?;
    let entity = match (kind.and_then(|k| k.parse::<EntityKind>().ok()), entity_id) {
        (Some(kind), Some(id)) => Some((kind, id)),
        _ => None,
    };

    Ok(FileSyncState {
        file_path: row.get(0)?,
        content_hash: row.get(1)?,
        file_size: row.get::<_, i64>(2)?.max(0) as u64,
        last_modified: parse_datetime(row.get(3)?).unwrap_or_default(),
        entity,
    })
}

/// Parse a stored RFC 3339 timestamp
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_metadata(blob: Option<String>) -> Frontmatter {
    blob.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}
