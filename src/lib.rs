//! sql-fanout library
//!
//! Runs an ordered batch of SQL statements against many independently
//! addressed site databases, isolates per-site failures, groups read results
//! by statement position across sites and exports them as one workbook.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod export;
pub mod models;
pub mod site;

pub use config::Config;
pub use engine::{Orchestrator, RunReport, RunRequest};
pub use error::{ExportError, RunError, SiteError};
pub use export::ReportExporter;
