//! Connection establishment for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory connections from parsed options.
//! - Configure pragmas and the busy timeout.
//! - Ping the connection before handing it out.
//!
//! # Invariants
//! - A returned connection has answered `SELECT 1`.
//! - `foreign_keys` matches the requested option.

use super::dsn::ConnectOptions;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

/// Parses `dsn` and opens a validated connection.
///
/// # Errors
/// - `DbError::InvalidDsn` when the string cannot be parsed.
/// - `DbError::Sqlite` when opening, configuring or pinging fails.
pub fn connect(dsn: &str) -> DbResult<Connection> {
    let options = match ConnectOptions::parse(dsn) {
        Ok(options) => options,
        Err(err) => {
            error!(
                "event=db_open module=db status=error error_code=invalid_dsn error={}",
                err
            );
            return Err(err);
        }
    };
    connect_with(&options)
}

/// Opens a validated connection from already parsed options.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn connect_with(options: &ConnectOptions) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = if options.is_in_memory() {
        "memory"
    } else {
        options.mode.as_str()
    };
    info!("event=db_open module=db status=start mode={mode}");

    let conn = match Connection::open_with_flags(&options.path, options.mode.flags()) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match configure_and_ping(&conn, options) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_ping_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Opens (creating if needed) a database file with default options.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    connect_with(&ConnectOptions::new(
        path.as_ref().to_string_lossy().into_owned(),
    ))
}

/// Opens a private in-memory database with default options.
pub fn open_db_in_memory() -> DbResult<Connection> {
    connect_with(&ConnectOptions::in_memory())
}

fn configure_and_ping(conn: &Connection, options: &ConnectOptions) -> DbResult<()> {
    let foreign_keys = if options.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;
    conn.busy_timeout(options.connect_timeout)?;
    conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}
