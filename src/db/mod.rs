//! Database access layer.
//!
//! This module provides site database access:
//! - Session opening through the [`ConnectionFactory`] seam
//! - Statement execution with per-statement timeouts
//! - Type mappings from driver rows to JSON cell values

pub mod executor;
pub mod session;
pub mod types;

pub use executor::{DEFAULT_QUERY_TIMEOUT_SECS, StatementExecutor};
pub use session::{
    ConnectionFactory, DEFAULT_CONNECT_TIMEOUT_SECS, DbConnection, Session, SqlSession,
    SqlxConnectionFactory,
};
pub use types::RowValues;
