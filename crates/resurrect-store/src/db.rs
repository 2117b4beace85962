use rusqlite::Connection;

use crate::error::Result;

/// Initialise the state table.
///
/// Safe to call on every hook invocation — uses `IF NOT EXISTS`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS state (
            key         TEXT NOT NULL PRIMARY KEY,
            value       TEXT NOT NULL,   -- JSON document
            updated_at  INTEGER NOT NULL -- unix seconds
        );",
    )?;
    Ok(())
}
