//! v002 -- Last menu shown to each chat.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS context (
    chat_id INTEGER PRIMARY KEY NOT NULL,
    menu    TEXT    NOT NULL
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
