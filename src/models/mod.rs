//! Data models for sql-fanout.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod result;
pub mod statement;

// Re-export commonly used types
pub use connection::{ConnectionTarget, Credentials, DatabaseType};
pub use result::{ResultGroup, ResultTable, Row, RowSet, SITE_ID_COLUMN, StatementOutcome};
pub use statement::{Statement, StatementBatch, StatementKind, ordinal_label};
