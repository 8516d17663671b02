//! v001 -- Initial schema creation.
//!
//! One table: `blobs`, holding the independently serialized state blobs
//! keyed by name.  Each blob is a complete JSON document; writes replace
//! a single row, so blobs cannot corrupt one another.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS blobs (
    key        TEXT PRIMARY KEY NOT NULL,   -- blob name ('tasks', 'cell-data', ...)
    value      TEXT NOT NULL,               -- JSON document
    updated_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
