//! v004 -- Watch-lists of proposal numbers.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS proposals (
    chat_id     INTEGER NOT NULL,
    proposal_id INTEGER NOT NULL,

    PRIMARY KEY (chat_id, proposal_id)
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
