//! Workbook export of aggregated results.
//!
//! One sheet per statement ordinal. The target file is always new:
//! `query.xlsx`, then `query1.xlsx`, `query2.xlsx`, ... until a free name is
//! found. Files are opened with create-new semantics so an existing export is
//! never overwritten, not even by a concurrent writer.

pub mod workbook;

use crate::error::ExportError;
use crate::models::ResultGroup;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use workbook::{MAX_SHEET_NAME_LEN, sheet_name};

/// Default base name of export files.
pub const DEFAULT_EXPORT_BASENAME: &str = "query";

/// Workbook file extension.
pub const EXPORT_EXTENSION: &str = "xlsx";

/// Give up after this many taken names.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Writes a [`ResultGroup`] as a workbook.
#[derive(Debug, Clone)]
pub struct ReportExporter {
    basename: String,
}

impl ReportExporter {
    pub fn new() -> Self {
        Self::with_basename(DEFAULT_EXPORT_BASENAME)
    }

    pub fn with_basename(basename: impl Into<String>) -> Self {
        Self {
            basename: basename.into(),
        }
    }

    /// Candidate file name for the given attempt (0 = no suffix).
    pub fn file_name(&self, attempt: u32) -> String {
        if attempt == 0 {
            format!("{}.{}", self.basename, EXPORT_EXTENSION)
        } else {
            format!("{}{}.{}", self.basename, attempt, EXPORT_EXTENSION)
        }
    }

    /// Export `results` into `destination`, returning the path written.
    ///
    /// `results` is only read, so a failed export can be retried.
    pub fn export(&self, results: &ResultGroup, destination: &Path) -> Result<PathBuf, ExportError> {
        if results.is_empty() {
            return Err(ExportError::NothingToExport);
        }

        fs::create_dir_all(destination)
            .map_err(|e| ExportError::destination(destination, e))?;

        let bytes = workbook::render(results).map_err(|e| ExportError::write(destination, e))?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = destination.join(self.file_name(attempt));
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "Export name taken");
                    continue;
                }
                Err(e) => return Err(ExportError::destination(destination, e)),
            };

            if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_all()) {
                // Do not leave a truncated workbook behind.
                drop(file);
                let _ = fs::remove_file(&path);
                return Err(ExportError::write(&path, e));
            }

            info!(
                path = %path.display(),
                sheets = results.len(),
                rows = results.total_rows(),
                size = %humansize::format_size(bytes.len(), humansize::WINDOWS),
                "Results exported"
            );
            return Ok(path);
        }

        Err(ExportError::destination(
            destination,
            format!("no free file name after {} attempts", MAX_NAME_ATTEMPTS),
        ))
    }
}

impl Default for ReportExporter {
    fn default() -> Self {
        Self::new()
    }
}
