//! # Database Abstraction
//!
//! A thin wrapper over `rusqlite` giving repository modules `execute`/
//! `query`/`query_one` helpers instead of juggling prepared statements
//! directly. The connection lives behind `Arc<Mutex<_>>` so a single
//! `Database` handle can be cloned into every actix worker thread and
//! every repository implementation. Every statement runs through
//! [`Database::with_connection`], which retries on `SQLITE_BUSY` and
//! wraps the call in a `tracing` span.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, Result as SqliteResult};
use thiserror::Error;

/// How many times a statement retries after `SQLITE_BUSY` before giving
/// up. `PRAGMA busy_timeout` already covers contention inside a single
/// `rusqlite` call; this covers the window between this wrapper
/// acquiring the `Mutex` and another connection (e.g. a backup tool)
/// holding the file lock.
const BUSY_RETRY_ATTEMPTS: u32 = 5;
const BUSY_RETRY_BACKOFF: Duration = Duration::from_millis(20);

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::DatabaseBusy)
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database connection not initialized")]
    NotInitialized,
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// A thread-safe wrapper around a SQLite connection.
#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (creating if needed) the SQLite file at `path`, creating
    /// parent directories along the way.
    pub fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connection = Connection::open(path)?;
        connection.execute("PRAGMA foreign_keys = ON", [])?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Runs `op` against the locked connection, retrying on
    /// `SQLITE_BUSY` with a short linear backoff, and logging a
    /// `tracing` span per statement plus a debug line per retry.
    fn with_connection<T>(
        &self,
        statement: &str,
        mut op: impl FnMut(&Connection) -> SqliteResult<T>,
    ) -> DatabaseResult<T> {
        let _span = tracing::debug_span!("sqlite_query", statement).entered();

        for attempt in 1..=BUSY_RETRY_ATTEMPTS {
            let conn = self.connection.lock().map_err(|_| DatabaseError::NotInitialized)?;
            match op(&conn) {
                Ok(value) => return Ok(value),
                Err(err) if is_busy(&err) && attempt < BUSY_RETRY_ATTEMPTS => {
                    drop(conn);
                    tracing::debug!(attempt, "sqlite busy, retrying");
                    std::thread::sleep(BUSY_RETRY_BACKOFF * attempt);
                }
                Err(err) => return Err(err.into()),
            }
        }

        unreachable!("loop always returns by the final attempt")
    }

    pub fn execute<P>(&self, sql: &str, params: P) -> DatabaseResult<usize>
    where
        P: rusqlite::Params + Clone,
    {
        self.with_connection(sql, |conn| conn.execute(sql, params.clone()))
    }

    pub fn query<T, F, P>(&self, sql: &str, params: P, mut f: F) -> DatabaseResult<Vec<T>>
    where
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
        P: rusqlite::Params + Clone,
    {
        self.with_connection(sql, |conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params.clone(), &mut f)?;
            rows.collect()
        })
    }

    pub fn query_one<T, F, P>(&self, sql: &str, params: P, mut f: F) -> DatabaseResult<Option<T>>
    where
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
        P: rusqlite::Params + Clone,
    {
        self.with_connection(sql, |conn| {
            let mut stmt = conn.prepare(sql)?;
            let result = stmt.query_map(params.clone(), &mut f)?.next().transpose();
            result
        })
    }

    /// Runs `f` inside a `SAVEPOINT`, rolling it back on `Err`. Built on
    /// savepoints rather than `Connection::transaction` so the busy-retry
    /// loop in `with_connection` only ever needs a shared `&Connection`.
    pub fn transaction<T, F>(&self, mut f: F) -> DatabaseResult<T>
    where
        F: FnMut(&Connection) -> SqliteResult<T>,
    {
        self.with_connection("<transaction>", |conn| {
            conn.execute_batch("SAVEPOINT db_tx")?;
            match f(conn) {
                Ok(value) => {
                    conn.execute_batch("RELEASE db_tx")?;
                    Ok(value)
                }
                Err(err) => {
                    conn.execute_batch("ROLLBACK TO db_tx")?;
                    Err(err)
                }
            }
        })
    }
}
