//! Data access layer for person records stored in SQLite.
//! Callers establish a connection through `db`, wrap it in a repository and
//! call CRUD operations directly.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use db::{connect, open_db, open_db_in_memory, ConnectOptions, DbError, DbResult, OpenMode};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::person::{Person, PersonId, PersonValidationError};
pub use repo::limits::{CancelToken, RepoConfig, DEFAULT_STATEMENT_TIMEOUT};
pub use repo::memory::{InMemoryPersonRepository, InMemoryPersonTransaction};
pub use repo::person_repo::{
    PersonRepository, PersonStore, PersonTransaction, RepoError, RepoResult,
    SqlitePersonRepository, SqlitePersonTransaction,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
