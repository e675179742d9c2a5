//! Entity sync coordinators
//!
//! A coordinator reads one entity file, turns its frontmatter into a typed
//! record and writes that record into the cache together with the file's
//! sync state, all inside a single transaction.
//!
//! [`EntitySync`] holds the shared machinery (transactions, project and
//! milestone lookups, date normalization, metadata extraction). The
//! per-kind policy lives in the [`SyncRecord`] impls in `issue`,
//! `milestone` and `project`.

mod error;
mod issue;
mod milestone;
mod project;

pub use error::{ParseError, SyncError};
pub use issue::derive_issue_id;

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::Value;
use tracing::Span;

use crate::core::cache::EntityKind;
use crate::core::config::ProjectFallback;
use crate::core::file_meta::FileMetadata;
use crate::core::frontmatter::{self, Frontmatter};

/// A typed cache row built from one entity file
pub trait SyncRecord: Sized {
    const KIND: EntityKind;

    /// Frontmatter keys consumed by typed columns; everything else goes to
    /// the metadata blob
    const KNOWN_FIELDS: &'static [&'static str];

    /// Apply id derivation, reference resolution and defaults
    fn from_frontmatter(
        sync: &EntitySync<'_>,
        path: &Path,
        fields: Frontmatter,
    ) -> Result<Self, SyncError>;

    fn id(&self) -> &str;

    /// Insert or replace the row
    fn upsert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()>;
}

/// Shared sync machinery bound to one cache connection
pub struct EntitySync<'c> {
    conn: &'c mut Connection,
    fallback: ProjectFallback,
    span: Span,
}

impl<'c> EntitySync<'c> {
    pub fn new(conn: &'c mut Connection, fallback: ProjectFallback, span: Span) -> Self {
        Self {
            conn,
            fallback,
            span,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run `f` inside a transaction
    ///
    /// Commits when `f` returns `Ok`. On `Err`, or if anything unwinds
    /// before the commit, the transaction is dropped and rolled back.
    pub fn transaction<F, R>(&mut self, f: F) -> Result<R, SyncError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, SyncError>,
    {
        let tx = self.conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Project used when a record has no `project_id`
    pub fn default_project_id(&self) -> Option<String> {
        let result = match &self.fallback {
            ProjectFallback::Disabled => return None,
            ProjectFallback::First => self
                .conn
                .query_row("SELECT id FROM projects ORDER BY id LIMIT 1", [], |row| {
                    row.get(0)
                })
                .optional(),
            ProjectFallback::Fixed(id) => self
                .conn
                .query_row(
                    "SELECT id FROM projects WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional(),
        };
        self.lookup("default project", result)
    }

    /// Id of the milestone whose title is exactly `name`
    pub fn milestone_id_by_name(&self, name: &str) -> Option<String> {
        let result = self
            .conn
            .query_row(
                "SELECT id FROM milestones WHERE title = ?1 ORDER BY id LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional();
        self.lookup("milestone by name", result)
    }

    /// A failed lookup is logged and treated as "not found"
    fn lookup<T>(&self, what: &str, result: rusqlite::Result<Option<T>>) -> Option<T> {
        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(parent: &self.span, "{} lookup failed: {}", what, e);
                None
            }
        }
    }

    /// Parse a date-like frontmatter value
    ///
    /// Accepts RFC 3339, `YYYY-MM-DD`, `YYYY-MM-DD[T ]HH:MM[:SS]` and unix
    /// seconds. Naive values are taken as UTC. Empty or unparseable input
    /// gives `None`.
    pub fn normalize_date(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => parse_date_str(s.trim()),
            Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
            _ => None,
        }
    }

    /// JSON object of every field not in `known`, or `None` if there are none
    pub fn extract_metadata(fields: &Frontmatter, known: &[&str]) -> Option<String> {
        metadata_json(&split_extra(fields, known))
    }

    /// Record the current hash/size/mtime of `path`
    ///
    /// Returns `Ok(false)` without writing when the metadata can't be read.
    pub fn update_sync_state(&mut self, path: &Path) -> Result<bool, SyncError> {
        self.transaction(|tx| Ok(write_sync_state(tx, path, None)?))
    }

    /// Sync one file, reporting why it failed
    pub fn try_sync<R: SyncRecord>(&mut self, path: &Path) -> Result<R, SyncError> {
        if !path.is_file() {
            return Err(SyncError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let fields = frontmatter::parse_file(path)
            .map_err(|e| SyncError::parse(path, e))?
            .ok_or_else(|| SyncError::NoFrontmatter {
                path: path.to_path_buf(),
            })?;

        let record = R::from_frontmatter(self, path, fields)?;
        let id = record.id().to_string();

        let replaced = self.transaction(|tx| {
            let replaced = drop_replaced_entity(tx, &absolute_path(path), R::KIND, &id)?;
            record.upsert(tx)?;
            write_sync_state(tx, path, Some((R::KIND, &id)))?;
            Ok(replaced)
        })?;

        if let Some((kind, old_id)) = replaced {
            tracing::debug!(parent: &self.span, kind = %kind, id = %old_id, path = %path.display(), "dropped entity replaced by new id");
        }
        tracing::debug!(parent: &self.span, kind = %R::KIND, id = %id, path = %path.display(), "synced");
        Ok(record)
    }

    /// Sync one file, logging and swallowing any failure
    ///
    /// Batch scans call this so that one bad file never stops the pass.
    pub fn sync<R: SyncRecord>(&mut self, path: &Path) -> bool {
        match self.try_sync::<R>(path) {
            Ok(_) => true,
            Err(e) if e.is_skip() => {
                tracing::warn!(parent: &self.span, path = %path.display(), "skipping {}: {}", R::KIND, e);
                false
            }
            Err(e) => {
                tracing::error!(parent: &self.span, path = %path.display(), error = %e, "failed to sync {}", R::KIND);
                false
            }
        }
    }
}

/// Upsert the `file_sync_state` row for `path`
///
/// A coordinator passes the entity it wrote; a bare state refresh keeps
/// whatever entity was recorded before.
pub(crate) fn write_sync_state(
    tx: &Transaction<'_>,
    path: &Path,
    entity: Option<(EntityKind, &str)>,
) -> rusqlite::Result<bool> {
    let Some(meta) = FileMetadata::extract(path) else {
        return Ok(false);
    };

    tx.execute(
        r#"INSERT INTO file_sync_state
               (file_path, content_hash, file_size, last_modified, entity_kind, entity_id)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(file_path) DO UPDATE SET
               content_hash = excluded.content_hash,
               file_size = excluded.file_size,
               last_modified = excluded.last_modified,
               entity_kind = COALESCE(excluded.entity_kind, file_sync_state.entity_kind),
               entity_id = COALESCE(excluded.entity_id, file_sync_state.entity_id)"#,
        params![
            absolute_path(path),
            meta.content_hash,
            meta.file_size as i64,
            format_date(&meta.last_modified),
            entity.map(|(kind, _)| kind.as_str()),
            entity.map(|(_, id)| id),
        ],
    )?;

    Ok(true)
}

/// Delete the row a file produced under its previous id
///
/// Runs before the new row is written. The old row stays when another file
/// still claims it. Returns the dropped entity, if any.
fn drop_replaced_entity(
    tx: &Transaction<'_>,
    file_key: &str,
    kind: EntityKind,
    id: &str,
) -> rusqlite::Result<Option<(EntityKind, String)>> {
    let previous: Option<(String, String)> = tx
        .query_row(
            "SELECT entity_kind, entity_id FROM file_sync_state
             WHERE file_path = ?1 AND entity_kind IS NOT NULL AND entity_id IS NOT NULL",
            params![file_key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((old_kind, old_id)) = previous else {
        return Ok(None);
    };
    let Ok(old_kind) = old_kind.parse::<EntityKind>() else {
        return Ok(None);
    };
    if old_kind == kind && old_id == id {
        return Ok(None);
    }

    let deleted = tx.execute(
        &format!(
            "DELETE FROM {} WHERE id = ?1 AND NOT EXISTS (
                 SELECT 1 FROM file_sync_state
                 WHERE entity_kind = ?2 AND entity_id = ?1 AND file_path != ?3)",
            old_kind.table()
        ),
        params![old_id, old_kind.as_str(), file_key],
    )?;

    Ok((deleted > 0).then_some((old_kind, old_id)))
}

/// Key used for `file_sync_state.file_path`
pub fn absolute_path(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

/// Canonical text form of a date: RFC 3339, whole seconds, `Z` suffix
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// String value of a field; blank strings and nulls count as absent
pub(crate) fn field_text(fields: &Frontmatter, key: &str) -> Option<String> {
    let text = match fields.get(key)? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Numeric value of a field; numeric strings are accepted
pub(crate) fn field_number(
    fields: &Frontmatter,
    key: &'static str,
) -> Result<Option<f64>, ParseError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ParseError::invalid(key, format!("is not a number: {:?}", s))),
        Some(other) => Err(ParseError::invalid(key, format!("is not a number: {}", other))),
    }
}

/// Fields not in `known`, in their original form
pub(crate) fn split_extra(fields: &Frontmatter, known: &[&str]) -> Frontmatter {
    fields
        .iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

pub(crate) fn metadata_json(extra: &Frontmatter) -> Option<String> {
    if extra.is_empty() {
        None
    } else {
        serde_json::to_string(extra).ok()
    }
}

/// File name without its extension
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::EntityCache;
    use serde_json::json;
    use tempfile::tempdir;

    fn insert_project(cache: &EntityCache, id: &str) {
        cache
            .conn()
            .execute(
                "INSERT INTO projects (id, name, status) VALUES (?1, ?1, 'active')",
                params![id],
            )
            .unwrap();
    }

    #[test]
    fn test_default_project_none_when_empty() {
        let mut cache = EntityCache::open_in_memory().unwrap();
        let sync = cache.entity_sync(ProjectFallback::First, Span::none());
        assert_eq!(sync.default_project_id(), None);
    }

    #[test]
    fn test_default_project_first_is_lowest_id() {
        let mut cache = EntityCache::open_in_memory().unwrap();
        insert_project(&cache, "web");
        insert_project(&cache, "api");
        let sync = cache.entity_sync(ProjectFallback::First, Span::none());
        assert_eq!(sync.default_project_id().as_deref(), Some("api"));
    }

    #[test]
    fn test_default_project_fixed_and_disabled() {
        let mut cache = EntityCache::open_in_memory().unwrap();
        insert_project(&cache, "api");
        insert_project(&cache, "web");

        let fixed = cache.entity_sync(ProjectFallback::Fixed("web".into()), Span::none());
        assert_eq!(fixed.default_project_id().as_deref(), Some("web"));

        let missing = cache.entity_sync(ProjectFallback::Fixed("mobile".into()), Span::none());
        assert_eq!(missing.default_project_id(), None);

        let disabled = cache.entity_sync(ProjectFallback::Disabled, Span::none());
        assert_eq!(disabled.default_project_id(), None);
    }

    #[test]
    fn test_milestone_lookup_is_exact() {
        let mut cache = EntityCache::open_in_memory().unwrap();
        cache
            .conn()
            .execute(
                "INSERT INTO milestones (id, project_id, title, status) VALUES ('m1', 'p', 'Sprint 1', 'open')",
                [],
            )
            .unwrap();
        let sync = cache.entity_sync(ProjectFallback::First, Span::none());
        assert_eq!(sync.milestone_id_by_name("Sprint 1").as_deref(), Some("m1"));
        assert_eq!(sync.milestone_id_by_name("sprint 1"), None);
        assert_eq!(sync.milestone_id_by_name("Sprint 2"), None);
    }

    #[test]
    fn test_lookup_failure_returns_none() {
        let mut cache = EntityCache::open_in_memory().unwrap();
        cache.conn().execute_batch("DROP TABLE milestones;").unwrap();
        let sync = cache.entity_sync(ProjectFallback::First, Span::none());
        assert_eq!(sync.milestone_id_by_name("Sprint 1"), None);
    }

    #[test]
    fn test_normalize_date_formats() {
        let expected = "2025-03-01T00:00:00Z";
        for input in [
            "2025-03-01",
            "2025-03-01T00:00:00",
            "2025-03-01 00:00",
            "2025-03-01T00:00:00Z",
            "2025-03-01T01:00:00+01:00",
        ] {
            let parsed = EntitySync::normalize_date(&json!(input)).unwrap();
            assert_eq!(format_date(&parsed), expected, "input {}", input);
        }
        let from_unix = EntitySync::normalize_date(&json!(1740787200)).unwrap();
        assert_eq!(format_date(&from_unix), expected);
    }

    #[test]
    fn test_normalize_date_canonical_unchanged() {
        let canonical = "2024-12-31T23:59:59Z";
        let parsed = EntitySync::normalize_date(&json!(canonical)).unwrap();
        assert_eq!(format_date(&parsed), canonical);
    }

    #[test]
    fn test_normalize_date_rejects_bad_input() {
        assert!(EntitySync::normalize_date(&json!("")).is_none());
        assert!(EntitySync::normalize_date(&json!("   ")).is_none());
        assert!(EntitySync::normalize_date(&json!("next tuesday")).is_none());
        assert!(EntitySync::normalize_date(&json!("2025-13-40")).is_none());
        assert!(EntitySync::normalize_date(&Value::Null).is_none());
        assert!(EntitySync::normalize_date(&json!(["2025-01-01"])).is_none());
    }

    #[test]
    fn test_extract_metadata() {
        let mut fields = Frontmatter::new();
        fields.insert("id".into(), json!("a"));
        fields.insert("labels".into(), json!(["ui"]));
        fields.insert("github_issue".into(), json!(12));

        let blob = EntitySync::extract_metadata(&fields, &["id"]).unwrap();
        let parsed: Frontmatter = serde_json::from_str(&blob).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["labels"], json!(["ui"]));
        assert_eq!(parsed["github_issue"], json!(12));

        assert_eq!(
            EntitySync::extract_metadata(&fields, &["id", "labels", "github_issue"]),
            None
        );
    }

    #[test]
    fn test_field_helpers() {
        let mut fields = Frontmatter::new();
        fields.insert("blank".into(), json!("  "));
        fields.insert("num".into(), json!(3));
        fields.insert("text_num".into(), json!("2.5"));
        fields.insert("bad".into(), json!("lots"));

        assert_eq!(field_text(&fields, "blank"), None);
        assert_eq!(field_text(&fields, "num").as_deref(), Some("3"));
        assert_eq!(field_number(&fields, "num").unwrap(), Some(3.0));
        assert_eq!(field_number(&fields, "text_num").unwrap(), Some(2.5));
        assert_eq!(field_number(&fields, "missing").unwrap(), None);
        assert!(field_number(&fields, "bad").is_err());
    }

    #[test]
    fn test_update_sync_state_writes_one_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("issue-1.md");
        std::fs::write(&path, "---\nid: 1\n---\n").unwrap();

        let mut cache = EntityCache::open_in_memory().unwrap();
        {
            let mut sync = cache.entity_sync(ProjectFallback::First, Span::none());
            assert!(sync.update_sync_state(&path).unwrap());
            assert!(sync.update_sync_state(&path).unwrap());
        }

        let state = cache.get_sync_state(&path).unwrap();
        assert_eq!(state.file_size, 14);
        assert!(state.entity.is_none());
        assert_eq!(cache.statistics().unwrap().tracked_files, 1);
    }

    #[test]
    fn test_update_sync_state_missing_file_is_noop() {
        let dir = tempdir().unwrap();
        let mut cache = EntityCache::open_in_memory().unwrap();
        {
            let mut sync = cache.entity_sync(ProjectFallback::First, Span::none());
            assert!(!sync.update_sync_state(&dir.path().join("gone.md")).unwrap());
        }
        assert_eq!(cache.statistics().unwrap().tracked_files, 0);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut cache = EntityCache::open_in_memory().unwrap();
        {
            let mut sync = cache.entity_sync(ProjectFallback::First, Span::none());
            let result: Result<(), SyncError> = sync.transaction(|tx| {
                tx.execute(
                    "INSERT INTO projects (id, name, status) VALUES ('p', 'P', 'active')",
                    [],
                )?;
                Err(SyncError::NoFrontmatter {
                    path: "forced.md".into(),
                })
            });
            assert!(result.is_err());
        }
        assert_eq!(cache.statistics().unwrap().count(EntityKind::Project), 0);
    }
}
