//! Site sessions.
//!
//! Each site gets exactly one dedicated connection for the lifetime of its
//! batch. Connections are never pooled, shared between sites or reused
//! across runs.
//!
//! [`ConnectionFactory`] and [`Session`] are the seams the orchestrator
//! depends on; [`SqlxConnectionFactory`] is the real implementation.

use crate::db::executor::StatementExecutor;
use crate::error::{SiteError, StatementExecutionError, connection_suggestion};
use crate::models::{ConnectionTarget, DatabaseType, Statement, StatementOutcome};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// An open session to one site.
#[async_trait]
pub trait Session: Send {
    /// Run one statement.
    async fn execute(
        &mut self,
        statement: &Statement,
    ) -> Result<StatementOutcome, StatementExecutionError>;

    /// Close the session. Safe to call on a session that never ran anything.
    async fn close(self: Box<Self>);
}

/// Opens sessions for connection targets.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open a session. Failures are always [`SiteError::Connection`] tagged
    /// with the target's host.
    async fn open(&self, target: &ConnectionTarget) -> Result<Box<dyn Session>, SiteError>;
}

/// Database-specific connection (avoids `AnyConnection` limitations).
pub enum DbConnection {
    MySql(MySqlConnection),
    Postgres(PgConnection),
    SQLite(SqliteConnection),
}

impl DbConnection {
    /// Open a connection for the given target.
    pub async fn connect(target: &ConnectionTarget) -> Result<Self, sqlx::Error> {
        let port = target.effective_port();
        match target.db_type {
            DatabaseType::MySQL => {
                let mut options = MySqlConnectOptions::new()
                    .host(&target.host)
                    .username(&target.username)
                    .password(&target.password)
                    .database(&target.database)
                    .charset("utf8mb4");
                if let Some(port) = port {
                    options = options.port(port);
                }
                Ok(Self::MySql(MySqlConnection::connect_with(&options).await?))
            }
            DatabaseType::PostgreSQL => {
                let mut options = PgConnectOptions::new()
                    .host(&target.host)
                    .username(&target.username)
                    .password(&target.password)
                    .database(&target.database);
                if let Some(port) = port {
                    options = options.port(port);
                }
                Ok(Self::Postgres(PgConnection::connect_with(&options).await?))
            }
            DatabaseType::SQLite => {
                // The resolved host is a directory; the database is a file inside it.
                let options = SqliteConnectOptions::new()
                    .filename(Path::new(&target.host).join(&target.database))
                    .create_if_missing(false);
                Ok(Self::SQLite(SqliteConnection::connect_with(&options).await?))
            }
        }
    }

    /// Get the database type for this connection.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbConnection::MySql(_) => DatabaseType::MySQL,
            DbConnection::Postgres(_) => DatabaseType::PostgreSQL,
            DbConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<(), sqlx::Error> {
        match self {
            DbConnection::MySql(conn) => conn.close().await,
            DbConnection::Postgres(conn) => conn.close().await,
            DbConnection::SQLite(conn) => conn.close().await,
        }
    }
}

/// A [`Session`] backed by a single sqlx connection.
pub struct SqlSession {
    host: String,
    connection: DbConnection,
    executor: StatementExecutor,
}

impl SqlSession {
    pub fn new(host: impl Into<String>, connection: DbConnection, executor: StatementExecutor) -> Self {
        Self {
            host: host.into(),
            connection,
            executor,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl Session for SqlSession {
    async fn execute(
        &mut self,
        statement: &Statement,
    ) -> Result<StatementOutcome, StatementExecutionError> {
        self.executor.execute(&mut self.connection, statement).await
    }

    async fn close(self: Box<Self>) {
        let host = self.host;
        if let Err(e) = self.connection.close().await {
            warn!(host = %host, error = %e, "Failed to close session cleanly");
        } else {
            debug!(host = %host, "Session closed");
        }
    }
}

/// Opens [`SqlSession`]s with the configured timeouts.
#[derive(Debug, Clone)]
pub struct SqlxConnectionFactory {
    connect_timeout: Duration,
    executor: StatementExecutor,
}

impl SqlxConnectionFactory {
    pub fn new(connect_timeout_secs: u64, query_timeout_secs: u64) -> Self {
        Self {
            connect_timeout: Duration::from_secs(connect_timeout_secs.max(1)),
            executor: StatementExecutor::with_timeout(query_timeout_secs),
        }
    }
}

impl Default for SqlxConnectionFactory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            executor: StatementExecutor::new(),
        }
    }
}

#[async_trait]
impl ConnectionFactory for SqlxConnectionFactory {
    async fn open(&self, target: &ConnectionTarget) -> Result<Box<dyn Session>, SiteError> {
        info!(target = %target.masked(), "Connecting to site");

        let connection = match timeout(self.connect_timeout, DbConnection::connect(target)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                let message = e.to_string();
                let suggestion = connection_suggestion(&message);
                return Err(SiteError::connection(&target.host, message, suggestion));
            }
            Err(_) => {
                return Err(SiteError::connection(
                    &target.host,
                    format!(
                        "Timed out after {}s while connecting",
                        self.connect_timeout.as_secs()
                    ),
                    connection_suggestion("timed out"),
                ));
            }
        };

        debug!(host = %target.host, db_type = %connection.db_type(), "Session opened");
        Ok(Box::new(SqlSession::new(
            &target.host,
            connection,
            self.executor.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credentials;

    #[tokio::test]
    async fn test_missing_sqlite_file_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = ConnectionTarget::new(
            DatabaseType::SQLite,
            dir.path().to_str().unwrap(),
            None,
            &Credentials::new("u", "p", "missing.db"),
        );

        let factory = SqlxConnectionFactory::default();
        let err = match factory.open(&target).await {
            Ok(_) => panic!("expected connection error"),
            Err(e) => e,
        };
        assert!(matches!(err, SiteError::Connection { .. }));
        assert!(err.to_string().contains(dir.path().to_str().unwrap()));
    }

    #[tokio::test]
    async fn test_sqlite_session_closes_unused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("site.db")).unwrap();
        let target = ConnectionTarget::new(
            DatabaseType::SQLite,
            dir.path().to_str().unwrap(),
            None,
            &Credentials::new("u", "p", "site.db"),
        );

        let session = SqlxConnectionFactory::default().open(&target).await.unwrap();
        session.close().await;
    }
}
