//! Issue sync policy

use std::path::Path;

use rusqlite::{params, Transaction};

use super::{
    field_number, field_text, file_stem, format_date, metadata_json, split_extra, EntitySync,
    SyncError, SyncRecord,
};
use crate::core::cache::{EntityKind, IssueRecord};
use crate::core::frontmatter::Frontmatter;

const ISSUE_FIELDS: &[&str] = &[
    "id",
    "project_id",
    "milestone_id",
    "milestone",
    "title",
    "description",
    "status",
    "priority",
    "type",
    "issue_type",
    "assignee",
    "estimated_hours",
    "estimate_hours",
    "due_date",
];

/// Issue id: explicit `id`, else the file stem minus an `issue-` prefix
pub fn derive_issue_id(fields: &Frontmatter, path: &Path) -> String {
    field_text(fields, "id").unwrap_or_else(|| {
        let stem = file_stem(path);
        match stem.strip_prefix("issue-") {
            Some(rest) => rest.to_string(),
            None => stem,
        }
    })
}

impl SyncRecord for IssueRecord {
    const KIND: EntityKind = EntityKind::Issue;
    const KNOWN_FIELDS: &'static [&'static str] = ISSUE_FIELDS;

    fn from_frontmatter(
        sync: &EntitySync<'_>,
        path: &Path,
        fields: Frontmatter,
    ) -> Result<Self, SyncError> {
        let id = derive_issue_id(&fields, path);

        let project_id = field_text(&fields, "project_id")
            .or_else(|| sync.default_project_id())
            .ok_or_else(|| SyncError::UnresolvedProjectReference {
                kind: EntityKind::Issue,
                id: id.clone(),
            })?;

        // An unknown milestone name leaves the issue unassigned in the
        // cache; the file keeps the name.
        let milestone_id = field_text(&fields, "milestone_id").or_else(|| {
            let name = field_text(&fields, "milestone")?;
            let resolved = sync.milestone_id_by_name(&name);
            if resolved.is_none() {
                tracing::debug!(parent: sync.span(), issue = %id, milestone = %name, "milestone not found");
            }
            resolved
        });

        let estimate_hours = match field_number(&fields, "estimated_hours") {
            Ok(None) => field_number(&fields, "estimate_hours"),
            other => other,
        }
        .map_err(|e| SyncError::parse(path, e))?;

        Ok(IssueRecord {
            milestone_id,
            title: field_text(&fields, "title").unwrap_or_else(|| "Untitled".to_string()),
            description: field_text(&fields, "description"),
            status: field_text(&fields, "status").unwrap_or_else(|| "open".to_string()),
            priority: field_text(&fields, "priority").unwrap_or_else(|| "medium".to_string()),
            issue_type: field_text(&fields, "type")
                .or_else(|| field_text(&fields, "issue_type"))
                .unwrap_or_else(|| "task".to_string()),
            assignee: field_text(&fields, "assignee"),
            estimate_hours,
            due_date: fields.get("due_date").and_then(EntitySync::normalize_date),
            extra: split_extra(&fields, Self::KNOWN_FIELDS),
            id,
            project_id,
        })
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn upsert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute(
            r#"INSERT OR REPLACE INTO issues
                   (id, project_id, milestone_id, title, description, status, priority,
                    issue_type, assignee, estimate_hours, due_date, metadata)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
            params![
                self.id,
                self.project_id,
                self.milestone_id,
                self.title,
                self.description,
                self.status,
                self.priority,
                self.issue_type,
                self.assignee,
                self.estimate_hours,
                self.due_date.as_ref().map(format_date),
                metadata_json(&self.extra),
            ],
        )?;
        Ok(())
    }
}

impl EntitySync<'_> {
    /// Sync one issue file; `false` if it was skipped or failed
    pub fn sync_issue(&mut self, path: &Path) -> bool {
        self.sync::<IssueRecord>(path)
    }
}
