//! Site ID sources.
//!
//! A run targets either one manually entered site or every site listed in a
//! file. Files are read by extension:
//! - spreadsheets (`.xlsx`, `.xlsm`, `.xls`, `.ods`): first sheet, `siteid` column
//! - `.csv`: `siteid` column
//! - anything else: plain text, comma-delimited if it contains a comma,
//!   newline-delimited otherwise
//!
//! The column lookup is case-insensitive. Values are trimmed, blanks dropped
//! and file order kept. All failures are run-fatal.

use crate::error::{RunError, RunResult};
use calamine::{Data, Reader, open_workbook_auto};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Header that holds site IDs in tabular files.
pub const SITE_ID_HEADER: &str = "siteid";

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

/// Where the run's site IDs come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteSource {
    /// One manually entered ID.
    Single(String),
    /// A bulk list on disk.
    File(PathBuf),
}

impl SiteSource {
    /// Produce the ordered, normalized site IDs.
    pub fn load(&self) -> RunResult<Vec<String>> {
        match self {
            Self::Single(raw) => {
                let site_id = raw.trim();
                if site_id.is_empty() {
                    return Err(RunError::MissingSiteId);
                }
                Ok(vec![site_id.to_string()])
            }
            Self::File(path) => {
                let ids = load_file(path)?;
                if ids.is_empty() {
                    return Err(RunError::bulk_source(path, "file contains no site IDs"));
                }
                info!(path = %path.display(), count = ids.len(), "Loaded site IDs");
                Ok(ids)
            }
        }
    }
}

fn load_file(path: &Path) -> RunResult<Vec<String>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    debug!(path = %path.display(), extension = %extension, "Reading site file");

    if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        load_spreadsheet(path)
    } else if extension == "csv" {
        load_csv(path)
    } else {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RunError::bulk_source(path, e.to_string()))?;
        Ok(parse_plain_text(&content))
    }
}

fn load_spreadsheet(path: &Path) -> RunResult<Vec<String>> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| RunError::bulk_source(path, e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RunError::bulk_source(path, "workbook has no worksheets"))?
        .map_err(|e| RunError::bulk_source(path, e.to_string()))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| missing_column(path))?
        .iter()
        .map(cell_text)
        .collect::<Vec<_>>();
    let column = find_site_column(&header).ok_or_else(|| missing_column(path))?;

    Ok(rows
        .filter_map(|row| row.get(column).map(cell_text))
        .filter_map(normalize)
        .collect())
}

fn load_csv(path: &Path) -> RunResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| RunError::bulk_source(path, e.to_string()))?;

    let header = reader
        .headers()
        .map_err(|e| RunError::bulk_source(path, e.to_string()))?
        .iter()
        .map(String::from)
        .collect::<Vec<_>>();
    let column = find_site_column(&header).ok_or_else(|| missing_column(path))?;

    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RunError::bulk_source(path, e.to_string()))?;
        if let Some(id) = record.get(column).and_then(|v| normalize(v.to_string())) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Split plain text on commas if any are present, else on lines.
pub fn parse_plain_text(content: &str) -> Vec<String> {
    let pieces: Vec<&str> = if content.contains(',') {
        content.split(',').collect()
    } else {
        content.lines().collect()
    };
    pieces
        .into_iter()
        .filter_map(|piece| normalize(piece.to_string()))
        .collect()
}

fn find_site_column(header: &[String]) -> Option<usize> {
    header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(SITE_ID_HEADER))
}

fn missing_column(path: &Path) -> RunError {
    RunError::bulk_source(
        path,
        format!("file must contain a column named '{}'", SITE_ID_HEADER),
    )
}

fn normalize(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Render a spreadsheet cell as an ID; whole floats lose their `.0`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            (*f as i64).to_string()
        }
        other => other.to_string(),
    }
}
