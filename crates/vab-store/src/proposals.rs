use rusqlite::params;

use vab_core::domain::ChatId;

use crate::database::Database;
use crate::error::Result;

impl Database {
    pub fn watched_proposals(&self, chat: ChatId) -> Result<Vec<i64>> {
        let mut stmt = self.conn().prepare(
            "SELECT proposal_id FROM proposals WHERE chat_id = ?1 ORDER BY proposal_id ASC",
        )?;
        let rows = stmt.query_map(params![chat.0], |row| row.get(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Returns false when the proposal was already watched.
    pub fn watch_proposal(&self, chat: ChatId, proposal_id: i64) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO proposals (chat_id, proposal_id) VALUES (?1, ?2)",
            params![chat.0, proposal_id],
        )?;
        Ok(affected > 0)
    }

    /// Returns false when the proposal was not watched.
    pub fn unwatch_proposal(&self, chat: ChatId, proposal_id: i64) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM proposals WHERE chat_id = ?1 AND proposal_id = ?2",
            params![chat.0, proposal_id],
        )?;
        Ok(affected > 0)
    }
}
