//! Error types for sql-fanout.
//!
//! Errors are split by the scope they affect. `RunError` and `ExportError`
//! abort a run (before the site loop) or the export step (after it).
//! `SiteError` and `StatementExecutionError` only ever end the work of one
//! site; the orchestrator stores them in the site's outcome and moves on.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// A site identifier could not be turned into a host address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error formatting Site ID '{site_id}': {reason}")]
pub struct AddressFormatError {
    pub site_id: String,
    pub reason: String,
}

impl AddressFormatError {
    pub fn new(site_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            reason: reason.into(),
        }
    }
}

/// A single statement failed on an open session.
#[derive(Error, Debug, Clone)]
#[error("{cause}")]
pub struct StatementExecutionError {
    pub statement: String,
    pub cause: String,
    /// e.g., "42S02" for an unknown table
    pub sql_state: Option<String>,
}

impl StatementExecutionError {
    pub fn new(
        statement: impl Into<String>,
        cause: impl Into<String>,
        sql_state: Option<String>,
    ) -> Self {
        Self {
            statement: statement.into(),
            cause: cause.into(),
            sql_state,
        }
    }

    /// Build from a driver error raised while running `statement`.
    pub fn from_sqlx(statement: &str, err: sqlx::Error) -> Self {
        let failure = DriverFailure::from(err);
        Self::new(statement, failure.message, failure.sql_state)
    }

    /// Build the error reported when a statement exceeds its time budget.
    pub fn timed_out(statement: &str, elapsed_secs: u64) -> Self {
        Self::new(
            statement,
            format!("Timeout: statement exceeded {}s", elapsed_secs),
            None,
        )
    }
}

/// Failures scoped to one site. Never aborts the run.
#[derive(Error, Debug)]
pub enum SiteError {
    #[error(transparent)]
    AddressFormat(#[from] AddressFormatError),

    #[error("Connection error for host {host}: {message}")]
    Connection {
        host: String,
        message: String,
        suggestion: String,
    },

    #[error("Query {ordinal} failed: {source}")]
    Statement {
        ordinal: usize,
        #[source]
        source: StatementExecutionError,
    },
}

impl SiteError {
    /// Create a connection error tagged with the host that could not be reached.
    pub fn connection(
        host: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Connection {
            host: host.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Wrap a statement failure with its ordinal in the batch.
    pub fn statement(ordinal: usize, source: StatementExecutionError) -> Self {
        Self::Statement { ordinal, source }
    }

    /// True when the site was never reached (no statement ran).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::AddressFormat(_) | Self::Connection { .. })
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }
}

/// Failures that end the whole run before any site is contacted.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("No SQL statements to run: the batch is empty after splitting on ';'")]
    EmptyBatch,

    #[error("Please enter a Site ID or select a file with Site IDs")]
    MissingSiteId,

    #[error("Error reading site file {}: {message}", path.display())]
    BulkSource { path: PathBuf, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl RunError {
    /// Create a bulk source error for the given file.
    pub fn bulk_source(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::BulkSource {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Failures of the export step. In-memory results survive these.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No results to export")]
    NothingToExport,

    #[error("Cannot use export directory {}: {message}", path.display())]
    Destination { path: PathBuf, message: String },

    #[error("Error writing workbook {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

impl ExportError {
    pub fn destination(path: impl AsRef<Path>, message: impl ToString) -> Self {
        Self::Destination {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn write(path: impl AsRef<Path>, message: impl ToString) -> Self {
        Self::Write {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for run-level operations.
pub type RunResult<T> = Result<T, RunError>;

/// Flattened view of a driver error: message plus optional SQLSTATE.
#[derive(Debug, Clone)]
pub(crate) struct DriverFailure {
    pub message: String,
    pub sql_state: Option<String>,
}

impl From<sqlx::Error> for DriverFailure {
    fn from(err: sqlx::Error) -> Self {
        let (message, sql_state) = match err {
            sqlx::Error::Database(db_err) => (
                db_err.message().to_string(),
                db_err.code().map(|c| c.to_string()),
            ),
            sqlx::Error::Configuration(msg) => (format!("Configuration error: {}", msg), None),
            sqlx::Error::Io(io_err) => (format!("I/O error: {}", io_err), None),
            sqlx::Error::Tls(tls_err) => (format!("TLS error: {}", tls_err), None),
            sqlx::Error::Protocol(msg) => (format!("Protocol error: {}", msg), None),
            sqlx::Error::ColumnDecode { index, source } => (
                format!("Failed to decode column {}: {}", index, source),
                None,
            ),
            sqlx::Error::Decode(source) => (format!("Decode error: {}", source), None),
            sqlx::Error::WorkerCrashed => ("Database worker crashed".to_string(), None),
            other => (other.to_string(), None),
        };
        Self { message, sql_state }
    }
}

/// Generate a helpful suggestion for a failed connection attempt.
pub(crate) fn connection_suggestion(error: &str) -> String {
    let error_str = error.to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("timed out") {
        return "Check that the site's database server is running and reachable".to_string();
    }

    if error_str.contains("authentication")
        || error_str.contains("password")
        || error_str.contains("access denied")
    {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists on every site".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    "Check the site ID, host override and database backend".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_error_display() {
        let err = AddressFormatError::new("ab", "too short");
        assert_eq!(err.to_string(), "Error formatting Site ID 'ab': too short");
    }

    #[test]
    fn test_site_error_scope() {
        let unreachable = SiteError::connection("10.16.131.00", "refused", "check server");
        assert!(unreachable.is_unreachable());
        assert_eq!(unreachable.suggestion(), Some("check server"));

        let address: SiteError = AddressFormatError::new("x", "bad").into();
        assert!(address.is_unreachable());

        let failed = SiteError::statement(
            2,
            StatementExecutionError::new("SELECT * FROM nope", "no such table: nope", None),
        );
        assert!(!failed.is_unreachable());
        assert_eq!(failed.to_string(), "Query 2 failed: no such table: nope");
    }

    #[test]
    fn test_connection_error_names_host() {
        let err = SiteError::connection("10.16.131.05", "Connection refused", "sugg");
        assert!(err.to_string().contains("10.16.131.05"));
    }

    #[test]
    fn test_statement_timeout_message() {
        let err = StatementExecutionError::timed_out("SELECT 1", 30);
        assert!(err.cause.contains("30s"));
        assert_eq!(err.statement, "SELECT 1");
    }

    #[test]
    fn test_connection_suggestion() {
        assert!(connection_suggestion("Connection refused (os error 111)").contains("reachable"));
        assert!(connection_suggestion("password authentication failed").contains("password"));
        assert!(connection_suggestion("Unknown database 'x'").contains("database name"));
    }

    #[test]
    fn test_bulk_source_display() {
        let err = RunError::bulk_source("sites.csv", "missing column 'siteid'");
        let msg = err.to_string();
        assert!(msg.contains("sites.csv"));
        assert!(msg.contains("siteid"));
    }
}
