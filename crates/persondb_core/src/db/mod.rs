//! SQLite connection establishment and schema bootstrap.
//!
//! # Responsibility
//! - Turn a connection string into a configured, pinged SQLite connection.
//! - Provide the `users` table bootstrap and schema introspection helpers.
//!
//! # Invariants
//! - Connections handed out by this module have answered a ping.
//! - Nothing here reads or writes person rows.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod dsn;
mod open;
pub mod schema;

pub use dsn::{ConnectOptions, OpenMode};
pub use open::{connect, connect_with, open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    InvalidDsn(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidDsn(message) => write!(f, "invalid connection string: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::InvalidDsn(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
