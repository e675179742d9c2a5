//! Milestone sync policy

use std::path::Path;

use rusqlite::{params, Transaction};

use super::{
    field_number, field_text, file_stem, format_date, metadata_json, split_extra, EntitySync,
    SyncError, SyncRecord,
};
use crate::core::cache::{EntityKind, MilestoneRecord};
use crate::core::frontmatter::Frontmatter;

const MILESTONE_FIELDS: &[&str] = &[
    "id",
    "project_id",
    "title",
    "name",
    "description",
    "status",
    "due_date",
    "progress_percentage",
];

impl SyncRecord for MilestoneRecord {
    const KIND: EntityKind = EntityKind::Milestone;
    const KNOWN_FIELDS: &'static [&'static str] = MILESTONE_FIELDS;

    fn from_frontmatter(
        sync: &EntitySync<'_>,
        path: &Path,
        fields: Frontmatter,
    ) -> Result<Self, SyncError> {
        let id = field_text(&fields, "id").unwrap_or_else(|| file_stem(path));

        let project_id = field_text(&fields, "project_id")
            .or_else(|| sync.default_project_id())
            .ok_or_else(|| SyncError::UnresolvedProjectReference {
                kind: EntityKind::Milestone,
                id: id.clone(),
            })?;

        let progress_percentage = field_number(&fields, "progress_percentage")
            .map_err(|e| SyncError::parse(path, e))?
            .unwrap_or(0.0);

        Ok(MilestoneRecord {
            title: field_text(&fields, "title")
                .or_else(|| field_text(&fields, "name"))
                .unwrap_or_else(|| "Untitled Milestone".to_string()),
            description: field_text(&fields, "description"),
            status: field_text(&fields, "status").unwrap_or_else(|| "open".to_string()),
            due_date: fields.get("due_date").and_then(EntitySync::normalize_date),
            progress_percentage,
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
            r#"INSERT OR REPLACE INTO milestones
                   (id, project_id, title, description, status, due_date,
                    progress_percentage, metadata)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                self.id,
                self.project_id,
                self.title,
                self.description,
                self.status,
                self.due_date.as_ref().map(format_date),
                self.progress_percentage,
                metadata_json(&self.extra),
            ],
        )?;
        Ok(())
    }
}

impl EntitySync<'_> {
    /// Sync one milestone file; `false` if it was skipped or failed
    pub fn sync_milestone(&mut self, path: &Path) -> bool {
        self.sync::<MilestoneRecord>(path)
    }
}
