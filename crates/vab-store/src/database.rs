//! Database connection management.
//!
//! [`Database::open`] never changes the schema: callers check
//! [`Database::pending_migrations`] and refuse to run against an outdated
//! file. [`Database::migrate`] is used by the migration runner.

use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self { conn })
    }

    /// A private, fully migrated in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.migrate()?;
        Ok(db)
    }

    /// Apply pending migrations; returns how many ran.
    pub fn migrate(&self) -> Result<u32> {
        migrations::run_migrations(&self.conn)
    }

    pub fn pending_migrations(&self) -> Result<u32> {
        migrations::pending(&self.conn)
    }

    pub fn schema_version(&self) -> Result<u32> {
        migrations::schema_version(&self.conn)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
