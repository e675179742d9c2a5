//! Database schema initialization

use miette::{IntoDiagnostic, Result};
use rusqlite::params;

use super::{EntityCache, SCHEMA_VERSION};

impl EntityCache {
    /// Initialize database schema
    pub(super) fn init_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL,
                metadata TEXT
            );

            CREATE TABLE IF NOT EXISTS milestones (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL,
                due_date TEXT,
                progress_percentage REAL NOT NULL DEFAULT 0,
                metadata TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_milestones_project ON milestones(project_id);
            CREATE INDEX IF NOT EXISTS idx_milestones_title ON milestones(title);

            CREATE TABLE IF NOT EXISTS issues (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                milestone_id TEXT,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL,
                priority TEXT NOT NULL,
                issue_type TEXT NOT NULL,
                assignee TEXT,
                estimate_hours REAL,
                due_date TEXT,
                metadata TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_issues_project ON issues(project_id);
            CREATE INDEX IF NOT EXISTS idx_issues_milestone ON issues(milestone_id);
            CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);

            -- Last observed state of every synced file
            CREATE TABLE IF NOT EXISTS file_sync_state (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path TEXT NOT NULL UNIQUE,
                content_hash TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                last_modified TEXT NOT NULL,
                entity_kind TEXT,
                entity_id TEXT
            );

            -- Links from local entities to external trackers
            CREATE TABLE IF NOT EXISTS remote_links (
                entity_id TEXT NOT NULL,
                backend TEXT NOT NULL,
                remote_id TEXT NOT NULL,
                linked_at TEXT NOT NULL,
                PRIMARY KEY (entity_id, backend, remote_id)
            );
            CREATE INDEX IF NOT EXISTS idx_remote_links_remote ON remote_links(backend, remote_id);
            "#,
            )
            .into_diagnostic()?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .into_diagnostic()?;

        Ok(())
    }
}
