//! Project sync policy

use std::path::Path;

use rusqlite::{params, Transaction};

use super::{field_text, file_stem, metadata_json, split_extra, EntitySync, SyncError, SyncRecord};
use crate::core::cache::{EntityKind, ProjectRecord};
use crate::core::frontmatter::Frontmatter;

const PROJECT_FIELDS: &[&str] = &["id", "name", "title", "description", "status"];

impl SyncRecord for ProjectRecord {
    const KIND: EntityKind = EntityKind::Project;
    const KNOWN_FIELDS: &'static [&'static str] = PROJECT_FIELDS;

    fn from_frontmatter(
        _sync: &EntitySync<'_>,
        path: &Path,
        fields: Frontmatter,
    ) -> Result<Self, SyncError> {
        Ok(ProjectRecord {
            id: field_text(&fields, "id").unwrap_or_else(|| file_stem(path)),
            name: field_text(&fields, "name")
                .or_else(|| field_text(&fields, "title"))
                .unwrap_or_else(|| "Untitled Project".to_string()),
            description: field_text(&fields, "description"),
            status: field_text(&fields, "status").unwrap_or_else(|| "active".to_string()),
            extra: split_extra(&fields, Self::KNOWN_FIELDS),
        })
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn upsert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO projects (id, name, description, status, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.id,
                self.name,
                self.description,
                self.status,
                metadata_json(&self.extra),
            ],
        )?;
        Ok(())
    }
}

impl EntitySync<'_> {
    /// Sync one project file; `false` if it was skipped or failed
    pub fn sync_project(&mut self, path: &Path) -> bool {
        self.sync::<ProjectRecord>(path)
    }
}
