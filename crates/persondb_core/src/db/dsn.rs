//! Connection string parsing.
//!
//! Accepted forms:
//! - a bare path, e.g. `/var/lib/persondb.sqlite3` or `:memory:`
//! - whitespace-separated `key=value` pairs, e.g.
//!   `path=persondb.sqlite3 mode=rwc connect_timeout=5 foreign_keys=on`
//!
//! Paths containing whitespace are only expressible in the bare form.

use super::{DbError, DbResult};
use rusqlite::OpenFlags;
use std::str::FromStr;
use std::time::Duration;

pub const MEMORY_PATH: &str = ":memory:";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How the database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Read-only; the file must exist.
    ReadOnly,
    /// Read-write; the file must exist.
    ReadWrite,
    /// Read-write, creating the file when missing.
    #[default]
    ReadWriteCreate,
}

impl OpenMode {
    pub(crate) fn flags(self) -> OpenFlags {
        let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self {
            Self::ReadOnly => base | OpenFlags::SQLITE_OPEN_READ_ONLY,
            Self::ReadWrite => base | OpenFlags::SQLITE_OPEN_READ_WRITE,
            Self::ReadWriteCreate => {
                base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
            Self::ReadWriteCreate => "rwc",
        }
    }
}

/// Parsed connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub path: String,
    pub mode: OpenMode,
    /// How long a statement waits on a locked database before failing.
    pub connect_timeout: Duration,
    pub foreign_keys: bool,
}

impl ConnectOptions {
    /// Options for `path` with every other setting at its default.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: OpenMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            foreign_keys: true,
        }
    }

    /// Options for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::new(MEMORY_PATH)
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }

    /// Parses a connection string in either accepted form.
    pub fn parse(dsn: &str) -> DbResult<Self> {
        let trimmed = dsn.trim();
        if trimmed.is_empty() {
            return Err(DbError::InvalidDsn("connection string is empty".to_string()));
        }
        if !trimmed.contains('=') {
            return Ok(Self::new(trimmed));
        }

        let mut path = None;
        let mut options = Self::new(String::new());
        for pair in trimmed.split_whitespace() {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                DbError::InvalidDsn(format!("expected `key=value`, got `{pair}`"))
            })?;
            match key {
                "path" => {
                    if value.is_empty() {
                        return Err(DbError::InvalidDsn("`path` cannot be empty".to_string()));
                    }
                    path = Some(value.to_string());
                }
                "mode" => options.mode = value.parse()?,
                "connect_timeout" => {
                    let seconds = value.parse::<u64>().map_err(|_| {
                        DbError::InvalidDsn(format!(
                            "`connect_timeout` must be whole seconds, got `{value}`"
                        ))
                    })?;
                    options.connect_timeout = Duration::from_secs(seconds);
                }
                "foreign_keys" => options.foreign_keys = parse_switch(key, value)?,
                other => {
                    return Err(DbError::InvalidDsn(format!("unknown key `{other}`")));
                }
            }
        }

        options.path = path.ok_or_else(|| DbError::InvalidDsn("missing `path`".to_string()))?;
        Ok(options)
    }
}

impl FromStr for OpenMode {
    type Err = DbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ro" => Ok(Self::ReadOnly),
            "rw" => Ok(Self::ReadWrite),
            "rwc" => Ok(Self::ReadWriteCreate),
            other => Err(DbError::InvalidDsn(format!(
                "unsupported mode `{other}`; expected ro|rw|rwc"
            ))),
        }
    }
}

fn parse_switch(key: &str, value: &str) -> DbResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(DbError::InvalidDsn(format!(
            "`{key}` must be on|off, got `{value}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectOptions, OpenMode, DEFAULT_CONNECT_TIMEOUT};
    use crate::db::DbError;
    use std::time::Duration;

    #[test]
    fn bare_path_uses_defaults() {
        let options = ConnectOptions::parse(" /tmp/people.sqlite3 ").unwrap();
        assert_eq!(options.path, "/tmp/people.sqlite3");
        assert_eq!(options.mode, OpenMode::ReadWriteCreate);
        assert_eq!(options.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(options.foreign_keys);
    }

    #[test]
    fn memory_path_is_recognized() {
        assert!(ConnectOptions::parse(":memory:").unwrap().is_in_memory());
        assert!(ConnectOptions::parse("path=:memory:").unwrap().is_in_memory());
    }

    #[test]
    fn key_value_form_sets_every_option() {
        let options =
            ConnectOptions::parse("path=people.db mode=ro connect_timeout=12 foreign_keys=off")
                .unwrap();
        assert_eq!(options.path, "people.db");
        assert_eq!(options.mode, OpenMode::ReadOnly);
        assert_eq!(options.connect_timeout, Duration::from_secs(12));
        assert!(!options.foreign_keys);
    }

    #[test]
    fn rejects_malformed_strings() {
        for dsn in [
            "",
            "   ",
            "mode=rw",
            "path=people.db host=localhost",
            "path=people.db mode=rwx",
            "path=people.db connect_timeout=soon",
            "path=people.db foreign_keys=maybe",
            "path=people.db stray",
            "path=",
        ] {
            let err = ConnectOptions::parse(dsn).expect_err(dsn);
            assert!(matches!(err, DbError::InvalidDsn(_)), "{dsn}: {err}");
        }
    }
}
