//! Storage for remote links

use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{FixPlan, LinkError, RemoteLink};
use crate::core::sync::format_date;

/// Where the validator reads and writes remote links
pub trait RemoteLinkRepository {
    /// Every link stored for `backend`, sorted
    fn links_for_backend(&self, backend: &str) -> Result<Vec<RemoteLink>, LinkError>;

    /// Backends with at least one stored link
    fn backends(&self) -> Result<BTreeSet<String>, LinkError>;

    /// Store a link; storing an existing link is a no-op
    fn link(&mut self, link: &RemoteLink) -> Result<(), LinkError>;

    /// Remove a link; removing a missing link is a no-op
    fn unlink(&mut self, link: &RemoteLink) -> Result<(), LinkError>;

    /// Apply a fix plan: removals first, then insertions
    fn apply(&mut self, plan: &FixPlan) -> Result<(), LinkError> {
        for link in plan.removals() {
            self.unlink(link)?;
        }
        for link in &plan.to_link {
            self.link(link)?;
        }
        Ok(())
    }
}

/// Link repository backed by the cache's `remote_links` table
pub struct SqliteLinkRepository<'c> {
    conn: &'c mut Connection,
}

impl<'c> SqliteLinkRepository<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self { conn }
    }
}

const INSERT_LINK: &str = "INSERT OR IGNORE INTO remote_links (entity_id, backend, remote_id, linked_at)
     VALUES (?1, ?2, ?3, ?4)";
const DELETE_LINK: &str =
    "DELETE FROM remote_links WHERE entity_id = ?1 AND backend = ?2 AND remote_id = ?3";

impl RemoteLinkRepository for SqliteLinkRepository<'_> {
    fn links_for_backend(&self, backend: &str) -> Result<Vec<RemoteLink>, LinkError> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_id, backend, remote_id FROM remote_links
             WHERE backend = ?1 ORDER BY entity_id, remote_id",
        )?;
        let links = stmt
            .query_map(params![backend], |row| {
                Ok(RemoteLink {
                    entity_id: row.get(0)?,
                    backend: row.get(1)?,
                    remote_id: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    fn backends(&self) -> Result<BTreeSet<String>, LinkError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT backend FROM remote_links")?;
        let backends = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<BTreeSet<String>>>()?;
        Ok(backends)
    }

    fn link(&mut self, link: &RemoteLink) -> Result<(), LinkError> {
        self.conn.execute(
            INSERT_LINK,
            params![link.entity_id, link.backend, link.remote_id, format_date(&Utc::now())],
        )?;
        Ok(())
    }

    fn unlink(&mut self, link: &RemoteLink) -> Result<(), LinkError> {
        self.conn.execute(
            DELETE_LINK,
            params![link.entity_id, link.backend, link.remote_id],
        )?;
        Ok(())
    }

    /// Applies the whole plan in one transaction
    fn apply(&mut self, plan: &FixPlan) -> Result<(), LinkError> {
        let linked_at = format_date(&Utc::now());
        let tx = self.conn.transaction()?;
        for link in plan.removals() {
            tx.execute(
                DELETE_LINK,
                params![link.entity_id, link.backend, link.remote_id],
            )?;
        }
        for link in &plan.to_link {
            tx.execute(
                INSERT_LINK,
                params![link.entity_id, link.backend, link.remote_id, linked_at],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
