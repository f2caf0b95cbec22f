//! `users` table bootstrap and schema introspection.
//!
//! The bootstrap is a single idempotent `CREATE TABLE IF NOT EXISTS`; there is
//! no version tracking.

use super::DbResult;
use rusqlite::Connection;

pub const USERS_TABLE: &str = "users";

/// Columns the person repository reads and writes, in read order.
pub const USERS_COLUMNS: [&str; 3] = ["id", "name", "email"];

const USERS_TABLE_SQL: &str = include_str!("sql/users.sql");

/// Creates the `users` table when it does not exist yet.
pub fn ensure_users_table(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(USERS_TABLE_SQL)?;
    Ok(())
}

pub fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
