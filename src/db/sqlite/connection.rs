//! SQLite connection utilities

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;

/// Open a connection with the pragmas every consumer expects:
/// WAL for concurrent readers, NORMAL sync for desktop durability.
pub fn create_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}
