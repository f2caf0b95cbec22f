//! Per-call time budget and cancellation for repository statements.
//!
//! # Responsibility
//! - Derive a fresh deadline for every repository call.
//! - Interrupt running statements once the deadline passes or the call is cancelled.
//!
//! # Invariants
//! - A call's deadline is `start + statement_timeout`, or an earlier external
//!   deadline when one is set. Deadlines never carry over between calls.
//! - The progress handler is removed when the call returns, on every path.

use super::person_repo::{RepoError, RepoResult};
use crate::db::DbError;
use log::{debug, warn};
use rusqlite::{Connection, ErrorCode};
use std::cell::Cell;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite virtual machine steps between deadline checks.
const PROGRESS_CHECK_OPS: c_int = 1000;

/// Repository tuning options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoConfig {
    /// Upper bound for a single repository call. A zero timeout fails every call.
    pub statement_timeout: Duration,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }
}

impl RepoConfig {
    pub fn with_statement_timeout(statement_timeout: Duration) -> Self {
        Self { statement_timeout }
    }
}

/// Cancellation flag shared between a repository and whoever may abort its calls.
///
/// Clones observe the same flag. Cancellation is permanent for the token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub(crate) struct CallLimits {
    config: RepoConfig,
    cancel: Option<CancelToken>,
    deadline: Cell<Option<Instant>>,
}

impl CallLimits {
    pub(crate) fn new(config: RepoConfig) -> Self {
        Self {
            config,
            cancel: None,
            deadline: Cell::new(None),
        }
    }

    pub(crate) fn config(&self) -> RepoConfig {
        self.config
    }

    pub(crate) fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = Some(token);
    }

    pub(crate) fn set_deadline(&self, deadline: Option<Instant>) {
        self.deadline.set(deadline);
    }

    fn deadline_from(&self, started_at: Instant) -> Option<Instant> {
        let own = started_at.checked_add(self.config.statement_timeout);
        match (own, self.deadline.get()) {
            (Some(own), Some(external)) => Some(own.min(external)),
            (own, external) => own.or(external),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|token| token.is_cancelled())
    }
}

/// Runs one repository call under its own deadline.
///
/// Calls that are already cancelled or past their deadline fail without
/// touching the connection.
pub(crate) fn run_bounded<T>(
    conn: &Connection,
    limits: &CallLimits,
    operation: &'static str,
    call: impl FnOnce(&Connection) -> RepoResult<T>,
) -> RepoResult<T> {
    let started_at = Instant::now();
    let deadline = limits.deadline_from(started_at);

    let result = if limits.is_cancelled() {
        Err(RepoError::Cancelled(operation))
    } else if deadline.is_some_and(|deadline| started_at >= deadline) {
        Err(RepoError::DeadlineExceeded(operation))
    } else {
        let _guard = ProgressGuard::install(conn, deadline, limits.cancel.clone());
        call(conn).map_err(|err| classify_interrupt(err, operation, limits))
    };

    match &result {
        Ok(_) => debug!(
            "event={} module=repo status=ok duration_ms={}",
            operation,
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event={} module=repo status=error duration_ms={} error_code={} error={}",
            operation,
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
    }
    result
}

fn classify_interrupt(err: RepoError, operation: &'static str, limits: &CallLimits) -> RepoError {
    let interrupted = matches!(
        &err,
        RepoError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(failure, _)))
            if failure.code == ErrorCode::OperationInterrupted
    );
    if !interrupted {
        return err;
    }
    if limits.is_cancelled() {
        RepoError::Cancelled(operation)
    } else {
        RepoError::DeadlineExceeded(operation)
    }
}

struct ProgressGuard<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ProgressGuard<'conn> {
    fn install(
        conn: &'conn Connection,
        deadline: Option<Instant>,
        cancel: Option<CancelToken>,
    ) -> Self {
        conn.progress_handler(
            PROGRESS_CHECK_OPS,
            Some(move || {
                cancel.as_ref().is_some_and(|token| token.is_cancelled())
                    || deadline.is_some_and(|deadline| Instant::now() >= deadline)
            }),
        );
        Self { conn }
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.conn
            .progress_handler(PROGRESS_CHECK_OPS, None::<fn() -> bool>);
    }
}
