//! Ordered schema migrations.
//!
//! Each migration is guarded by the `user_version` pragma so it runs exactly
//! once. The bot only checks for pending migrations; applying them is the job
//! of the `vab-migrate` binary.

pub mod v001_posts;
pub mod v002_context;
pub mod v003_preferences;
pub mod v004_proposals;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

struct Migration {
    version: u32,
    name: &'static str,
    up: fn(&Connection) -> std::result::Result<(), rusqlite::Error>,
}

const MIGRATIONS: [Migration; 4] = [
    Migration {
        version: 1,
        name: "v001_posts",
        up: v001_posts::up,
    },
    Migration {
        version: 2,
        name: "v002_context",
        up: v002_context::up,
    },
    Migration {
        version: 3,
        name: "v003_preferences",
        up: v003_preferences::up,
    },
    Migration {
        version: 4,
        name: "v004_proposals",
        up: v004_proposals::up,
    },
];

/// Current schema version. Bump this and add a migration whenever the schema changes.
pub const CURRENT_VERSION: u32 = 4;

pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Number of migrations not yet applied.
pub fn pending(conn: &Connection) -> Result<u32> {
    let current = schema_version(conn)?;
    if current > CURRENT_VERSION {
        tracing::warn!(
            current_version = current,
            known_version = CURRENT_VERSION,
            "database schema is newer than this binary"
        );
    }
    Ok(CURRENT_VERSION.saturating_sub(current))
}

/// Apply all pending migrations in order. Returns how many were applied.
///
/// Each migration and its version bump commit together, so a failure leaves
/// the database at the last good version.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    let current = schema_version(conn)?;

    tracing::info!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking database migrations"
    );

    let mut applied = 0;
    for m in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::info!(migration = m.name, "applying migration");
        let tx = conn.unchecked_transaction()?;
        (m.up)(&tx).map_err(|e| StoreError::Migration(format!("{}: {e}", m.name)))?;
        tx.pragma_update(None, "user_version", m.version)?;
        tx.commit()?;
        applied += 1;
    }

    Ok(applied)
}
