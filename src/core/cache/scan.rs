//! Batch synchronization of the cache with the entity files
//!
//! Rows of deleted files are pruned first, then projects are synced before
//! milestones and issues so that their default project and milestone-name
//! lookups see the current files. A file that fails to sync is logged and
//! counted; the pass always continues.
//!
//! Under [`ResyncPolicy::Changed`] an unchanged file is skipped only while no
//! project or milestone has been synced or pruned earlier in the pass, since
//! milestones and issues resolve references against those rows.

use std::path::Path;
use std::time::Instant;

use miette::{IntoDiagnostic, Result};
use rusqlite::params;
use tracing::Span;

use super::{EntityCache, EntityKind, FileSyncState, SyncStats};
use crate::core::config::{ProjectFallback, ResyncPolicy};
use crate::core::file_meta::FileMetadata;
use crate::core::project::Project;

impl EntityCache {
    /// Sync every entity file of the project into the cache
    pub fn sync_all(
        &mut self,
        project: &Project,
        fallback: ProjectFallback,
        resync: ResyncPolicy,
        span: Span,
    ) -> Result<SyncStats> {
        let start = Instant::now();
        let mut stats = SyncStats::default();

        let pruned = self.prune_deleted_files(&span)?;
        stats.removed = pruned.len();
        let mut references_changed = pruned
            .iter()
            .any(|state| matches!(&state.entity, Some((kind, _)) if *kind != EntityKind::Issue));

        for kind in EntityKind::sync_order() {
            let files: Vec<_> = project.iter_entity_files(kind).collect();
            tracing::debug!(parent: &span, kind = %kind, files = files.len(), "scanning");

            for path in files {
                stats.files_scanned += 1;

                if resync == ResyncPolicy::Changed
                    && !references_changed
                    && self.is_unchanged(&path)
                {
                    stats.unchanged += 1;
                    continue;
                }
                if kind != EntityKind::Issue {
                    references_changed = true;
                }

                let mut sync = self.entity_sync(fallback.clone(), span.clone());
                let ok = match kind {
                    EntityKind::Project => sync.sync_project(&path),
                    EntityKind::Milestone => sync.sync_milestone(&path),
                    EntityKind::Issue => sync.sync_issue(&path),
                };
                if ok {
                    stats.synced += 1;
                } else {
                    stats.failed += 1;
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            parent: &span,
            scanned = stats.files_scanned,
            synced = stats.synced,
            unchanged = stats.unchanged,
            failed = stats.failed,
            removed = stats.removed,
            "cache sync finished"
        );
        Ok(stats)
    }

    /// Drop every file-derived row, then sync all files again
    pub fn rebuild(
        &mut self,
        project: &Project,
        fallback: ProjectFallback,
        span: Span,
    ) -> Result<SyncStats> {
        self.clear()?;
        self.sync_all(project, fallback, ResyncPolicy::Always, span)
    }

    /// True when the recorded hash and size still match the file
    fn is_unchanged(&self, path: &Path) -> bool {
        let Some(state) = self.get_sync_state(path) else {
            return false;
        };
        let Some(meta) = FileMetadata::extract(path) else {
            return false;
        };
        state.entity.is_some()
            && state.content_hash == meta.content_hash
            && state.file_size == meta.file_size
    }

    /// Remove rows whose source file no longer exists, returning their states
    fn prune_deleted_files(&mut self, span: &Span) -> Result<Vec<FileSyncState>> {
        let gone: Vec<FileSyncState> = self
            .sync_states()?
            .into_iter()
            .filter(|state| !Path::new(&state.file_path).exists())
            .collect();

        if gone.is_empty() {
            return Ok(gone);
        }

        let tx = self.conn.transaction().into_diagnostic()?;
        for state in &gone {
            if let Some((kind, id)) = &state.entity {
                // Another file may have taken over the same id
                tx.execute(
                    &format!(
                        "DELETE FROM {} WHERE id = ?1 AND NOT EXISTS (
                             SELECT 1 FROM file_sync_state
                             WHERE entity_kind = ?2 AND entity_id = ?1 AND file_path != ?3)",
                        kind.table()
                    ),
                    params![id, kind.as_str(), state.file_path],
                )
                .into_diagnostic()?;
            }
            tx.execute(
                "DELETE FROM file_sync_state WHERE file_path = ?1",
                params![state.file_path],
            )
            .into_diagnostic()?;
            tracing::debug!(parent: span, path = %state.file_path, "removed deleted file from cache");
        }
        tx.commit().into_diagnostic()?;

        Ok(gone)
    }
}
