//! Statement execution engine.
//!
//! Runs one classified statement on one open site connection:
//! - Read statements fetch every row and report the declared columns, even
//!   for an empty result set
//! - Write statements run inside a transaction that is committed before the
//!   affected-row count is returned
//!
//! Every statement is bounded by the executor's timeout.
//!
//! # Architecture
//!
//! Database-specific implementations live in parallel submodules
//! (`mysql`, `postgres`, `sqlite`) so differences between them stay obvious.

use crate::db::session::DbConnection;
use crate::db::types::RowValues;
use crate::error::StatementExecutionError;
use crate::models::{RowSet, Statement, StatementKind, StatementOutcome};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Default per-statement timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 300;

/// Executes statements against an open [`DbConnection`].
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    query_timeout: Duration,
}

impl StatementExecutor {
    /// Create a new executor with the default timeout.
    pub fn new() -> Self {
        Self {
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    /// Create a new executor with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            query_timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Execute `statement` and return its typed outcome.
    pub async fn execute(
        &self,
        connection: &mut DbConnection,
        statement: &Statement,
    ) -> Result<StatementOutcome, StatementExecutionError> {
        let start = Instant::now();
        let sql = statement.sql();

        debug!(
            ordinal = statement.ordinal(),
            kind = ?statement.kind(),
            timeout_secs = self.query_timeout.as_secs(),
            "Executing statement"
        );

        let outcome = match statement.kind() {
            StatementKind::Read => {
                let row_set = match connection {
                    DbConnection::MySql(c) => mysql::fetch_rows(c, sql, self.query_timeout).await?,
                    DbConnection::Postgres(c) => {
                        postgres::fetch_rows(c, sql, self.query_timeout).await?
                    }
                    DbConnection::SQLite(c) => {
                        sqlite::fetch_rows(c, sql, self.query_timeout).await?
                    }
                };
                StatementOutcome::Read(row_set)
            }
            StatementKind::Write => {
                let rows_affected = match connection {
                    DbConnection::MySql(c) => {
                        mysql::execute_write(c, sql, self.query_timeout).await?
                    }
                    DbConnection::Postgres(c) => {
                        postgres::execute_write(c, sql, self.query_timeout).await?
                    }
                    DbConnection::SQLite(c) => {
                        sqlite::execute_write(c, sql, self.query_timeout).await?
                    }
                };
                StatementOutcome::Write { rows_affected }
            }
        };

        debug!(
            ordinal = statement.ordinal(),
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Statement finished"
        );

        Ok(outcome)
    }
}

impl Default for StatementExecutor {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

/// Await a driver future under `limit`, mapping both failure modes.
async fn bounded<T, F>(sql: &str, limit: Duration, work: F) -> Result<T, StatementExecutionError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(limit, work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(StatementExecutionError::from_sqlx(sql, e)),
        Err(_) => Err(StatementExecutionError::timed_out(sql, limit.as_secs())),
    }
}

/// Build a row set from non-empty driver rows.
fn collect_row_set<R: RowValues>(rows: &[R]) -> RowSet {
    let columns = rows
        .first()
        .map(RowValues::column_names)
        .unwrap_or_default();
    let values = rows.iter().map(RowValues::to_values).collect();
    RowSet::new(columns, values)
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod mysql {
    use super::*;
    use sqlx::{Column, Connection, MySqlConnection, Statement as _};

    pub async fn fetch_rows(
        conn: &mut MySqlConnection,
        sql: &str,
        query_timeout: Duration,
    ) -> Result<RowSet, StatementExecutionError> {
        let rows = bounded(sql, query_timeout, sqlx::Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql))).await?;
        if rows.is_empty() {
            return Ok(RowSet::new(declared_columns(conn, sql).await, Vec::new()));
        }
        Ok(collect_row_set(&rows))
    }

    async fn declared_columns(conn: &mut MySqlConnection, sql: &str) -> Vec<String> {
        match sqlx::Executor::prepare(&mut *conn, sql).await {
            Ok(stmt) => stmt.columns().iter().map(|c| c.name().to_string()).collect(),
            Err(e) => {
                debug!(error = %e, "Could not describe empty result set");
                Vec::new()
            }
        }
    }

    pub async fn execute_write(
        conn: &mut MySqlConnection,
        sql: &str,
        query_timeout: Duration,
    ) -> Result<u64, StatementExecutionError> {
        bounded(sql, query_timeout, async {
            let mut tx = conn.begin().await?;
            let result = sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(sql)).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(result.rows_affected())
        })
        .await
    }
}

mod postgres {
    use super::*;
    use sqlx::{Column, Connection, PgConnection, Statement as _};

    pub async fn fetch_rows(
        conn: &mut PgConnection,
        sql: &str,
        query_timeout: Duration,
    ) -> Result<RowSet, StatementExecutionError> {
        let rows = bounded(sql, query_timeout, sqlx::Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql))).await?;
        if rows.is_empty() {
            return Ok(RowSet::new(declared_columns(conn, sql).await, Vec::new()));
        }
        Ok(collect_row_set(&rows))
    }

    async fn declared_columns(conn: &mut PgConnection, sql: &str) -> Vec<String> {
        match sqlx::Executor::prepare(&mut *conn, sql).await {
            Ok(stmt) => stmt.columns().iter().map(|c| c.name().to_string()).collect(),
            Err(e) => {
                debug!(error = %e, "Could not describe empty result set");
                Vec::new()
            }
        }
    }

    pub async fn execute_write(
        conn: &mut PgConnection,
        sql: &str,
        query_timeout: Duration,
    ) -> Result<u64, StatementExecutionError> {
        bounded(sql, query_timeout, async {
            let mut tx = conn.begin().await?;
            let result = sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(sql)).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(result.rows_affected())
        })
        .await
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Column, Connection, SqliteConnection, Statement as _};

    pub async fn fetch_rows(
        conn: &mut SqliteConnection,
        sql: &str,
        query_timeout: Duration,
    ) -> Result<RowSet, StatementExecutionError> {
        let rows = bounded(sql, query_timeout, sqlx::Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql))).await?;
        if rows.is_empty() {
            return Ok(RowSet::new(declared_columns(conn, sql).await, Vec::new()));
        }
        Ok(collect_row_set(&rows))
    }

    async fn declared_columns(conn: &mut SqliteConnection, sql: &str) -> Vec<String> {
        match sqlx::Executor::prepare(&mut *conn, sql).await {
            Ok(stmt) => stmt.columns().iter().map(|c| c.name().to_string()).collect(),
            Err(e) => {
                debug!(error = %e, "Could not describe empty result set");
                Vec::new()
            }
        }
    }

    pub async fn execute_write(
        conn: &mut SqliteConnection,
        sql: &str,
        query_timeout: Duration,
    ) -> Result<u64, StatementExecutionError> {
        bounded(sql, query_timeout, async {
            let mut tx = conn.begin().await?;
            let result = sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(sql)).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(result.rows_affected())
        })
        .await
    }
}
