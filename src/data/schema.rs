//! Table definition for `testing_timdaen`.
//!
//! The table is owned outside this service; `create_table` exists for the
//! `init` command and for tests running against an in-memory database.

use rusqlite::Connection;

/// Table every statement targets
pub const TABLE: &str = "testing_timdaen";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS testing_timdaen (
    UserID     INTEGER PRIMARY KEY AUTOINCREMENT,
    Nama       TEXT    NOT NULL,
    Usia       INTEGER NOT NULL,
    Kota       TEXT    NOT NULL,
    LastUpdate TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

/// Create the table if it does not exist yet
pub fn create_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_TABLE)
}
