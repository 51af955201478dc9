//! Statement batch models.
//!
//! A batch is parsed once per run and shared read-only by every site.
//! Ordinals start at 1 and are the only key used to group results across sites.

use crate::error::{RunError, RunResult};

/// Separator between statements in raw query text.
pub const STATEMENT_SEPARATOR: char = ';';

/// Leading keyword of a row-producing statement.
const READ_KEYWORD: &str = "select";

/// Whether a statement produces rows or affects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

impl StatementKind {
    /// Classify SQL text by its leading keyword (case- and whitespace-insensitive).
    pub fn classify(sql: &str) -> Self {
        if sql.trim().to_lowercase().starts_with(READ_KEYWORD) {
            Self::Read
        } else {
            Self::Write
        }
    }
}

/// One trimmed, non-empty SQL command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    ordinal: usize,
    sql: String,
    kind: StatementKind,
}

impl Statement {
    fn new(ordinal: usize, sql: &str) -> Self {
        let sql = sql.trim().to_string();
        let kind = StatementKind::classify(&sql);
        Self { ordinal, sql, kind }
    }

    /// 1-based position in the batch.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn is_read(&self) -> bool {
        self.kind == StatementKind::Read
    }

    /// Sheet/group label for this statement, e.g. "Q1".
    pub fn label(&self) -> String {
        ordinal_label(self.ordinal)
    }
}

/// Label used for an ordinal everywhere results are grouped.
pub fn ordinal_label(ordinal: usize) -> String {
    format!("Q{}", ordinal)
}

/// Ordered, immutable sequence of statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementBatch {
    statements: Vec<Statement>,
}

impl StatementBatch {
    /// Split raw text on `;`, trim each piece and drop the empty ones.
    ///
    /// Fails with [`RunError::EmptyBatch`] when nothing is left.
    pub fn parse(raw: &str) -> RunResult<Self> {
        let statements: Vec<Statement> = raw
            .split(STATEMENT_SEPARATOR)
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .enumerate()
            .map(|(idx, piece)| Statement::new(idx + 1, piece))
            .collect();

        if statements.is_empty() {
            return Err(RunError::EmptyBatch);
        }

        Ok(Self { statements })
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// True if at least one statement produces rows (the run is exportable).
    pub fn has_reads(&self) -> bool {
        self.statements.iter().any(Statement::is_read)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Statement> {
        self.statements.iter()
    }
}

impl<'a> IntoIterator for &'a StatementBatch {
    type Item = &'a Statement;
    type IntoIter = std::slice::Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}
