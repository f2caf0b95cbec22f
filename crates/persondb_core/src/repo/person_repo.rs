//! Person repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `users` table with one prepared statement per call.
//! - Map store failures into semantic errors without retrying.
//!
//! # Invariants
//! - Only `id`, `name` and `email` are written; reads return exactly those.
//! - Update and delete that match no row fail with `NotFound`.
//! - Every call runs under its own deadline (see `repo::limits`).

use super::limits::{run_bounded, CallLimits, CancelToken, RepoConfig};
use crate::db::schema::{table_exists, table_has_column, USERS_COLUMNS, USERS_TABLE};
use crate::db::DbError;
use crate::model::person::{Person, PersonId, PersonValidationError};
use log::{debug, error, info, warn};
use rusqlite::types::{FromSql, Type};
use rusqlite::{ffi, params, Connection, Row, Statement, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const PERSON_INSERT_SQL: &str = "INSERT INTO users (id, name, email) VALUES (?1, ?2, ?3);";
const PERSON_UPDATE_SQL: &str = "UPDATE users SET name = ?1, email = ?2 WHERE id = ?3;";
const PERSON_SELECT_ALL_SQL: &str = "SELECT id, name, email FROM users;";
const PERSON_SELECT_BY_ID_SQL: &str = "SELECT id, name, email FROM users WHERE id = ?1;";
const PERSON_DELETE_SQL: &str = "DELETE FROM users WHERE id = ?1;";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from person repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Statement preparation or execution failed in the store.
    Db(DbError),
    /// Insert collided with an existing primary key.
    DuplicateId(PersonId),
    /// No row matched the requested id.
    NotFound(PersonId),
    /// A stored column could not be decoded into a `Person` field.
    Decode {
        index: usize,
        column: String,
        reason: String,
    },
    /// The record broke an in-process invariant before reaching the store.
    Validation(PersonValidationError),
    /// The store rolled back the enclosing transaction after an interrupted
    /// statement; the transaction accepts no further work.
    TransactionAborted,
    /// The call ran past its deadline. Carries the operation name.
    DeadlineExceeded(&'static str),
    /// The call was aborted through its cancel token.
    Cancelled(&'static str),
    /// The connection has no `users` table.
    MissingRequiredTable(&'static str),
    /// The `users` table lacks a mapped column.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(_) => "db_error",
            Self::DuplicateId(_) => "duplicate_id",
            Self::NotFound(_) => "not_found",
            Self::Decode { .. } => "decode_failed",
            Self::Validation(_) => "validation_failed",
            Self::TransactionAborted => "transaction_aborted",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
            Self::Cancelled(_) => "cancelled",
            Self::MissingRequiredTable(_) => "missing_table",
            Self::MissingRequiredColumn { .. } => "missing_column",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateId(id) => write!(f, "person already exists: {id}"),
            Self::NotFound(id) => write!(f, "person not found: {id}"),
            Self::Decode {
                index,
                column,
                reason,
            } => write!(
                f,
                "cannot decode column index {index}, name \"{column}\": {reason}"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::TransactionAborted => {
                write!(f, "transaction was rolled back by the store and cannot continue")
            }
            Self::DeadlineExceeded(operation) => write!(f, "{operation} exceeded its deadline"),
            Self::Cancelled(operation) => write!(f, "{operation} was cancelled"),
            Self::MissingRequiredTable(table) => {
                write!(f, "person repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "person repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PersonValidationError> for RepoError {
    fn from(value: PersonValidationError) -> Self {
        Self::Validation(value)
    }
}

/// CRUD capability set over person records.
pub trait PersonRepository {
    /// Inserts `id`, `name` and `email`; the other fields are ignored.
    fn create(&self, person: &Person) -> RepoResult<()>;
    /// Rewrites `name` and `email` of the row identified by `person.id`.
    fn update(&self, person: &Person) -> RepoResult<()>;
    /// Returns every person in store order.
    fn find(&self) -> RepoResult<Vec<Person>>;
    fn find_by_id(&self, id: PersonId) -> RepoResult<Person>;
    fn delete(&self, id: PersonId) -> RepoResult<()>;
}

/// Unit of work opened by [`PersonStore::begin`].
///
/// Dropping a transaction without calling `commit` rolls it back.
pub trait PersonTransaction: PersonRepository {
    fn commit(self) -> RepoResult<()>;
    fn rollback(self) -> RepoResult<()>;
}

/// Repository that owns its store and can open transactions on it.
pub trait PersonStore: PersonRepository {
    type Transaction<'a>: PersonTransaction
    where
        Self: 'a;

    fn begin(&mut self) -> RepoResult<Self::Transaction<'_>>;

    /// Releases the store. Release failures are returned, not discarded.
    fn close(self) -> RepoResult<()>;
}

/// SQLite-backed person repository owning its connection.
#[derive(Debug)]
pub struct SqlitePersonRepository {
    conn: Connection,
    limits: CallLimits,
}

impl SqlitePersonRepository {
    /// Wraps an open connection using the default [`RepoConfig`].
    ///
    /// # Errors
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when `users` lacks the
    ///   mapped columns. The connection is dropped in that case.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        Self::with_config(conn, RepoConfig::default())
    }

    pub fn with_config(conn: Connection, config: RepoConfig) -> RepoResult<Self> {
        ensure_person_connection_ready(&conn)?;
        Ok(Self {
            conn,
            limits: CallLimits::new(config),
        })
    }

    /// Lets `token` abort in-flight and future calls.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.limits.set_cancel_token(token);
        self
    }

    /// Caps every following call at `deadline` in addition to the configured
    /// timeout. `None` removes the cap.
    pub fn set_deadline(&self, deadline: Option<Instant>) {
        self.limits.set_deadline(deadline);
    }

    pub fn config(&self) -> RepoConfig {
        self.limits.config()
    }
}

impl PersonRepository for SqlitePersonRepository {
    fn create(&self, person: &Person) -> RepoResult<()> {
        insert_person(&self.conn, &self.limits, person)
    }

    fn update(&self, person: &Person) -> RepoResult<()> {
        update_person(&self.conn, &self.limits, person)
    }

    fn find(&self) -> RepoResult<Vec<Person>> {
        select_all(&self.conn, &self.limits)
    }

    fn find_by_id(&self, id: PersonId) -> RepoResult<Person> {
        select_by_id(&self.conn, &self.limits, id)
    }

    fn delete(&self, id: PersonId) -> RepoResult<()> {
        delete_person(&self.conn, &self.limits, id)
    }
}

impl PersonStore for SqlitePersonRepository {
    type Transaction<'a>
        = SqlitePersonTransaction<'a>
    where
        Self: 'a;

    fn begin(&mut self) -> RepoResult<SqlitePersonTransaction<'_>> {
        let tx = self.conn.transaction()?;
        debug!("event=tx_begin module=repo status=ok");
        Ok(SqlitePersonTransaction {
            tx,
            limits: &self.limits,
        })
    }

    fn close(self) -> RepoResult<()> {
        let started_at = Instant::now();
        match self.conn.close() {
            Ok(()) => {
                info!(
                    "event=db_close module=db status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err((_conn, err)) => {
                error!(
                    "event=db_close module=db status=error duration_ms={} error_code=db_close_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }
}

/// Transaction over a [`SqlitePersonRepository`] connection.
///
/// Statements run under the owning repository's limits.
///
/// An interrupted statement makes SQLite roll back the whole transaction.
/// From then on every call fails with `TransactionAborted`, so no later write
/// can slip out in autocommit mode.
#[derive(Debug)]
pub struct SqlitePersonTransaction<'conn> {
    tx: Transaction<'conn>,
    limits: &'conn CallLimits,
}

impl SqlitePersonTransaction<'_> {
    fn ensure_active(&self, operation: &'static str) -> RepoResult<()> {
        if self.tx.is_autocommit() {
            warn!(
                "event={} module=repo status=error error_code=transaction_aborted",
                operation
            );
            return Err(RepoError::TransactionAborted);
        }
        Ok(())
    }
}

impl PersonRepository for SqlitePersonTransaction<'_> {
    fn create(&self, person: &Person) -> RepoResult<()> {
        self.ensure_active("person_create")?;
        insert_person(&self.tx, self.limits, person)
    }

    fn update(&self, person: &Person) -> RepoResult<()> {
        self.ensure_active("person_update")?;
        update_person(&self.tx, self.limits, person)
    }

    fn find(&self) -> RepoResult<Vec<Person>> {
        self.ensure_active("person_find")?;
        select_all(&self.tx, self.limits)
    }

    fn find_by_id(&self, id: PersonId) -> RepoResult<Person> {
        self.ensure_active("person_find_by_id")?;
        select_by_id(&self.tx, self.limits, id)
    }

    fn delete(&self, id: PersonId) -> RepoResult<()> {
        self.ensure_active("person_delete")?;
        delete_person(&self.tx, self.limits, id)
    }
}

impl PersonTransaction for SqlitePersonTransaction<'_> {
    fn commit(self) -> RepoResult<()> {
        self.ensure_active("tx_commit")?;
        self.tx.commit()?;
        debug!("event=tx_commit module=repo status=ok");
        Ok(())
    }

    fn rollback(self) -> RepoResult<()> {
        self.ensure_active("tx_rollback")?;
        self.tx.rollback()?;
        debug!("event=tx_rollback module=repo status=ok");
        Ok(())
    }
}

fn insert_person(conn: &Connection, limits: &CallLimits, person: &Person) -> RepoResult<()> {
    person.validate()?;
    run_bounded(conn, limits, "person_create", |conn| {
        let mut stmt = conn.prepare(PERSON_INSERT_SQL)?;
        stmt.execute(params![person.id, person.name.as_str(), person.email.as_str()])
            .map_err(|err| map_insert_error(err, person.id))?;
        Ok(())
    })
}

fn update_person(conn: &Connection, limits: &CallLimits, person: &Person) -> RepoResult<()> {
    person.validate()?;
    run_bounded(conn, limits, "person_update", |conn| {
        let mut stmt = conn.prepare(PERSON_UPDATE_SQL)?;
        let changed =
            stmt.execute(params![person.name.as_str(), person.email.as_str(), person.id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(person.id));
        }
        Ok(())
    })
}

fn select_all(conn: &Connection, limits: &CallLimits) -> RepoResult<Vec<Person>> {
    run_bounded(conn, limits, "person_find", |conn| {
        let mut stmt = conn.prepare(PERSON_SELECT_ALL_SQL)?;
        let mut rows = stmt.query([])?;
        let mut people = Vec::new();
        while let Some(row) = rows.next()? {
            people.push(parse_person_row(row)?);
        }
        Ok(people)
    })
}

fn select_by_id(conn: &Connection, limits: &CallLimits, id: PersonId) -> RepoResult<Person> {
    run_bounded(conn, limits, "person_find_by_id", |conn| {
        let mut stmt = conn.prepare(PERSON_SELECT_BY_ID_SQL)?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => parse_person_row(row),
            None => Err(RepoError::NotFound(id)),
        }
    })
}

fn delete_person(conn: &Connection, limits: &CallLimits, id: PersonId) -> RepoResult<()> {
    run_bounded(conn, limits, "person_delete", |conn| {
        let mut stmt = conn.prepare(PERSON_DELETE_SQL)?;
        let changed = stmt.execute([id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    })
}

fn map_insert_error(err: rusqlite::Error, id: PersonId) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            RepoError::DuplicateId(id)
        }
        _ => err.into(),
    }
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    Ok(Person::new(
        decode_column::<PersonId>(row, 0, "integer")?,
        decode_column::<String>(row, 1, "text")?,
        decode_column::<String>(row, 2, "text")?,
    ))
}

fn decode_column<T: FromSql>(
    row: &Row<'_>,
    index: usize,
    expected: &'static str,
) -> RepoResult<T> {
    row.get::<_, T>(index).map_err(|err| match err {
        rusqlite::Error::InvalidColumnType(index, column, found) => RepoError::Decode {
            index,
            column,
            reason: format!(
                "converting {} to {expected} is unsupported",
                sql_type_name(found)
            ),
        },
        rusqlite::Error::FromSqlConversionFailure(index, _, source) => RepoError::Decode {
            index,
            column: column_name(row, index),
            reason: source.to_string(),
        },
        rusqlite::Error::IntegralValueOutOfRange(index, value) => RepoError::Decode {
            index,
            column: column_name(row, index),
            reason: format!("value {value} is out of range for {expected}"),
        },
        other => other.into(),
    })
}

fn column_name(row: &Row<'_>, index: usize) -> String {
    let stmt: &Statement<'_> = row.as_ref();
    stmt.column_name(index)
        .map(str::to_string)
        .unwrap_or_else(|_| format!("#{index}"))
}

fn sql_type_name(kind: Type) -> &'static str {
    match kind {
        Type::Null => "NULL",
        Type::Integer => "integer",
        Type::Real => "real",
        Type::Text => "text",
        Type::Blob => "blob",
    }
}

fn ensure_person_connection_ready(conn: &Connection) -> RepoResult<()> {
    if !table_exists(conn, USERS_TABLE)? {
        return Err(RepoError::MissingRequiredTable(USERS_TABLE));
    }

    for column in USERS_COLUMNS {
        if !table_has_column(conn, USERS_TABLE, column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: USERS_TABLE,
                column,
            });
        }
    }

    Ok(())
}
