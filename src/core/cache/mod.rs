//! SQLite-backed cache derived from the entity files
//!
//! This module provides a local SQLite cache that:
//! - Mirrors projects, milestones and issues for fast queries
//! - Records the hash, size and mtime of every synced file
//! - Stores links from issues to external trackers
//!
//! IMPORTANT: The cache is user-local and gitignored. The Markdown files
//! are the source of truth and the cache can always be rebuilt from them.

mod queries;
mod scan;
mod schema;
mod types;

pub use types::*;

use std::fs;
use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use rusqlite::Connection;

use crate::core::config::ProjectFallback;
use crate::core::project::Project;
use crate::core::remote::SqliteLinkRepository;
use crate::core::sync::EntitySync;

/// Cache file location within a project
const CACHE_FILE: &str = ".roadmap/cache.db";

/// Current schema version - cache is rebuilt on version mismatch
const SCHEMA_VERSION: i32 = 1;

/// The entity cache backed by SQLite
pub struct EntityCache {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl EntityCache {
    /// Open or create the cache for a project
    pub fn open(project: &Project) -> Result<Self> {
        Self::open_at(&project.root().join(CACHE_FILE))
    }

    /// Open or create a cache database at an explicit path
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).into_diagnostic()?;
        }

        let needs_init = !path.exists();
        let conn = Connection::open(path).into_diagnostic()?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .into_diagnostic()?;

        let mut cache = Self {
            conn,
            db_path: Some(path.to_path_buf()),
        };

        if needs_init {
            cache.init_schema()?;
        } else if cache.needs_schema_rebuild()? {
            // No migrations: the cache is derived, so drop and rebuild
            cache.reinitialize_schema()?;
        }

        Ok(cache)
    }

    /// Open a throwaway in-memory cache
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().into_diagnostic()?;
        let mut cache = Self {
            conn,
            db_path: None,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    /// Check if schema version matches current version
    fn needs_schema_rebuild(&self) -> Result<bool> {
        let current_version: i32 = self
            .conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get::<_, Option<i32>>(0)
            })
            .ok()
            .flatten()
            .unwrap_or(0);

        Ok(current_version != SCHEMA_VERSION)
    }

    /// Drop all tables and reinitialize schema
    fn reinitialize_schema(&mut self) -> Result<()> {
        tracing::info!(version = SCHEMA_VERSION, "cache schema changed, reinitializing");
        self.conn
            .execute_batch(
                r#"
                DROP TABLE IF EXISTS schema_version;
                DROP TABLE IF EXISTS projects;
                DROP TABLE IF EXISTS milestones;
                DROP TABLE IF EXISTS issues;
                DROP TABLE IF EXISTS file_sync_state;
                DROP TABLE IF EXISTS remote_links;
                "#,
            )
            .into_diagnostic()?;

        self.init_schema()
    }

    /// Read access to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Entity sync coordinator writing into this cache
    ///
    /// `span` carries the caller's correlation fields; every log line the
    /// coordinator emits is parented to it.
    pub fn entity_sync(&mut self, fallback: ProjectFallback, span: tracing::Span) -> EntitySync<'_> {
        EntitySync::new(&mut self.conn, fallback, span)
    }

    /// Remote link repository stored in this cache
    pub fn remote_links(&mut self) -> SqliteLinkRepository<'_> {
        SqliteLinkRepository::new(&mut self.conn)
    }

    /// Get cache statistics
    pub fn statistics(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();

        for kind in EntityKind::sync_order() {
            let count: usize = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", kind.table()), [], |row| {
                    row.get(0)
                })
                .into_diagnostic()?;
            stats.by_kind.insert(kind, count);
        }

        stats.tracked_files = self
            .conn
            .query_row("SELECT COUNT(*) FROM file_sync_state", [], |row| row.get(0))
            .into_diagnostic()?;
        stats.remote_links = self
            .conn
            .query_row("SELECT COUNT(*) FROM remote_links", [], |row| row.get(0))
            .into_diagnostic()?;

        stats.db_size_bytes = self
            .db_path
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(stats)
    }

    /// Delete every row derived from entity files
    ///
    /// Remote links are kept: they are owned by `validate-links`.
    pub fn clear(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            DELETE FROM issues;
            DELETE FROM milestones;
            DELETE FROM projects;
            DELETE FROM file_sync_state;
            "#,
            )
            .into_diagnostic()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
