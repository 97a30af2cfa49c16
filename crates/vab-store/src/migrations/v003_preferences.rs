//! v003 -- Per-chat, per-category notification preferences.
//!
//! A missing row means the defaults: every weekday off, 15:00, UTC.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS preferences (
    chat_id   INTEGER NOT NULL,
    pref_type TEXT    NOT NULL,               -- digest | new_proposals | proposals | alerts | general
    sunday    INTEGER NOT NULL DEFAULT 0,
    monday    INTEGER NOT NULL DEFAULT 0,
    tuesday   INTEGER NOT NULL DEFAULT 0,
    wednesday INTEGER NOT NULL DEFAULT 0,
    thursday  INTEGER NOT NULL DEFAULT 0,
    friday    INTEGER NOT NULL DEFAULT 0,
    saturday  INTEGER NOT NULL DEFAULT 0,
    time      TEXT    NOT NULL DEFAULT '15:00', -- local 'HH:MM'
    timezone  INTEGER NOT NULL DEFAULT 0,       -- whole hours from UTC

    PRIMARY KEY (chat_id, pref_type)
);

CREATE INDEX IF NOT EXISTS idx_preferences_type ON preferences(pref_type);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
