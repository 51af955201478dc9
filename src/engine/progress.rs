//! Human-readable progress stream.
//!
//! Lines are built per site into a [`ProgressLog`] and flushed to a
//! [`ProgressSink`] as one block, so concurrent sites interleave by block
//! and never inside one.

use crate::models::RowSet;
use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use std::io::Write;
use std::sync::Mutex;

/// Width of the rule printed under a result header.
const RULE_WIDTH: usize = 50;

/// Receives flushed blocks of progress lines.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, lines: &[String]);
}

/// Writes progress to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn emit(&self, lines: &[String]) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for line in lines {
            // A closed stdout must not take the run down with it.
            let _ = writeln!(out, "{}", line);
        }
        let _ = out.flush();
    }
}

/// Collects progress in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line emitted so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, lines: &[String]) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(lines);
    }
}

/// Per-site line buffer.
#[derive(Debug, Default)]
pub struct ProgressLog {
    lines: Vec<String>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn site_started(&mut self, site_id: &str) {
        self.lines
            .push(format!("--- Processing Site ID: {} ---", site_id));
    }

    pub fn statement_started(&mut self, ordinal: usize) {
        self.lines.push(format!("--- Running Query {} ---", ordinal));
    }

    /// Header, rule and one tab-joined line per row.
    pub fn read_preview(&mut self, row_set: &RowSet) {
        if !row_set.columns.is_empty() {
            self.lines.push(row_set.columns.join("\t"));
            self.lines.push("-".repeat(RULE_WIDTH));
        }
        if row_set.is_empty() {
            self.lines.push("No rows returned.".to_string());
        } else {
            for row in &row_set.rows {
                self.lines.push(join_row(row));
            }
        }
        self.blank();
    }

    pub fn rows_affected(&mut self, count: u64) {
        self.lines.push(format!(
            "Query executed successfully. Rows affected: {}",
            count
        ));
        self.blank();
    }

    pub fn site_failed(&mut self, site_id: &str, error: &dyn std::fmt::Display) {
        self.lines
            .push(format!("Error processing Site ID {}: {}", site_id, error));
        self.blank();
    }

    pub fn cancelled(&mut self, site_id: &str) {
        self.lines.push(format!(
            "Run cancelled before Site ID {} finished.",
            site_id
        ));
    }

    pub fn report_date(&mut self, date: NaiveDate) {
        self.lines
            .push(format!("Optional Date: {}", date.format("%Y-%m-%d")));
        self.blank();
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Hand the buffered block to `sink`.
    pub fn flush_to(self, sink: &dyn ProgressSink) {
        if !self.lines.is_empty() {
            sink.emit(&self.lines);
        }
    }
}

/// Render one cell for the preview.
pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(arr) => serde_json::to_string(arr).unwrap_or_default(),
        JsonValue::Object(obj) => serde_json::to_string(obj).unwrap_or_default(),
    }
}

fn join_row(row: &[JsonValue]) -> String {
    row.iter().map(format_value).collect::<Vec<_>>().join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_preview_lines() {
        let mut log = ProgressLog::new();
        log.read_preview(&RowSet::new(
            vec!["id".into(), "name".into()],
            vec![vec![json!(1), json!("a")], vec![json!(2), json!(null)]],
        ));
        assert_eq!(
            log.lines(),
            &[
                "id\tname".to_string(),
                "-".repeat(50),
                "1\ta".to_string(),
                "2\tNULL".to_string(),
                String::new(),
            ]
        );
    }

    #[test]
    fn test_empty_read_preview() {
        let mut log = ProgressLog::new();
        log.read_preview(&RowSet::new(vec!["id".into()], vec![]));
        assert_eq!(log.lines()[2], "No rows returned.");
    }

    #[test]
    fn test_write_and_failure_lines() {
        let mut log = ProgressLog::new();
        log.site_started("13100");
        log.statement_started(1);
        log.rows_affected(3);
        log.site_failed("13100", &"boom");
        assert_eq!(log.lines()[0], "--- Processing Site ID: 13100 ---");
        assert_eq!(log.lines()[1], "--- Running Query 1 ---");
        assert_eq!(
            log.lines()[2],
            "Query executed successfully. Rows affected: 3"
        );
        assert_eq!(log.lines()[4], "Error processing Site ID 13100: boom");
    }

    #[test]
    fn test_report_date_line() {
        let mut log = ProgressLog::new();
        log.report_date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(log.lines()[0], "Optional Date: 2024-03-07");
    }

    #[test]
    fn test_flush_is_one_block() {
        let sink = MemorySink::new();
        let mut log = ProgressLog::new();
        log.site_started("1");
        log.flush_to(&sink);
        ProgressLog::new().flush_to(&sink);
        assert_eq!(sink.lines(), vec!["--- Processing Site ID: 1 ---"]);
    }
}
