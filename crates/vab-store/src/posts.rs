use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use vab_core::domain::{ChatId, EntityKey, Outcome, PostKind};

use crate::database::Database;
use crate::error::Result;

/// `posts.date` format; lexicographic order matches time order.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_date(at: DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

impl Database {
    /// Append a delivery record.
    ///
    /// A second success for the same (kind, vote, phase, chat) is ignored by the
    /// unique index; returns whether a row was written.
    pub fn insert_post(
        &self,
        kind: PostKind,
        outcome: Outcome,
        key: Option<EntityKey>,
        chat: ChatId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO posts (type, date, result, proposal_id, vote_type, chat_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                kind.as_i64(),
                format_date(at),
                outcome.as_i64(),
                key.map(|k| k.vote_id),
                key.map(|k| k.phase.as_i64()),
                chat.0,
            ],
        )?;
        Ok(affected > 0)
    }

    pub fn has_success(&self, kind: PostKind, key: EntityKey, chat: ChatId) -> Result<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM posts
                 WHERE type = ?1 AND result = 1 AND proposal_id = ?2 AND vote_type = ?3
                   AND chat_id = ?4
                 LIMIT 1",
                params![kind.as_i64(), key.vote_id, key.phase.as_i64(), chat.0],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Whether a success of `kind` for `chat` was recorded strictly after `since`.
    pub fn has_success_since(
        &self,
        kind: PostKind,
        chat: ChatId,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM posts
                 WHERE type = ?1 AND result = 1 AND chat_id = ?2 AND date > ?3
                 LIMIT 1",
                params![kind.as_i64(), chat.0, format_date(since)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
