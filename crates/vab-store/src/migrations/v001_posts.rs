//! v001 -- Dedup records for posted notifications.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    type        INTEGER NOT NULL,             -- PostKind
    date        TEXT    NOT NULL,             -- UTC, 'YYYY-MM-DD HH:MM:SS'
    result      INTEGER NOT NULL,             -- 1 success, 0 failure
    proposal_id INTEGER,                      -- vote id, entity-keyed kinds only
    vote_type   INTEGER,                      -- 0 informal, 1 formal
    chat_id     INTEGER NOT NULL DEFAULT 0    -- 0 is the broadcast chat
);

CREATE INDEX IF NOT EXISTS idx_posts_chat_type_date
    ON posts(chat_id, type, result, date);

-- At most one success per (kind, vote, phase, subscriber).
CREATE UNIQUE INDEX IF NOT EXISTS idx_posts_single_success
    ON posts(type, proposal_id, vote_type, chat_id)
    WHERE result = 1 AND proposal_id IS NOT NULL;
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
