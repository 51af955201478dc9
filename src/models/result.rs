//! Result data models.
//!
//! Cell values are kept as `serde_json::Value` so every backend decodes into
//! one representation that the progress renderer and the workbook writer share.

use crate::models::statement::ordinal_label;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Name of the origin column prepended to every aggregated table.
pub const SITE_ID_COLUMN: &str = "SiteID";

/// One result row, values in column order.
pub type Row = Vec<JsonValue>;

/// Rows and declared columns returned by a read statement on one site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names in server-reported order.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What a statement produced on one session.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    Read(RowSet),
    Write { rows_affected: u64 },
}

/// A row set tagged with the site it came from.
///
/// Built by the aggregator, so `columns[0]` is always [`SITE_ID_COLUMN`]
/// and every row starts with the site's ID.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub origin_site: String,
}

impl ResultTable {
    /// Prepend the origin column and value to a repaired row set.
    pub fn tagged(site_id: &str, row_set: RowSet) -> Self {
        let mut columns = Vec::with_capacity(row_set.columns.len() + 1);
        columns.push(SITE_ID_COLUMN.to_string());
        columns.extend(row_set.columns);

        let rows = row_set
            .rows
            .into_iter()
            .map(|row| {
                let mut tagged = Vec::with_capacity(row.len() + 1);
                tagged.push(JsonValue::String(site_id.to_string()));
                tagged.extend(row);
                tagged
            })
            .collect();

        Self {
            columns,
            rows,
            origin_site: site_id.to_string(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Per-run mapping from statement ordinal to the tables each site produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultGroup {
    groups: BTreeMap<usize, Vec<ResultTable>>,
}

impl ResultGroup {
    pub(crate) fn from_map(groups: BTreeMap<usize, Vec<ResultTable>>) -> Self {
        Self { groups }
    }

    /// Tables for an ordinal, in insertion order.
    pub fn get(&self, ordinal: usize) -> Option<&[ResultTable]> {
        self.groups.get(&ordinal).map(Vec::as_slice)
    }

    /// Look up by label, e.g. `"Q1"`.
    pub fn by_label(&self, label: &str) -> Option<&[ResultTable]> {
        let ordinal = label.strip_prefix('Q')?.parse::<usize>().ok()?;
        self.get(ordinal)
    }

    /// Iterate `(ordinal, tables)` in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[ResultTable])> {
        self.groups.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Labels in ordinal order.
    pub fn labels(&self) -> Vec<String> {
        self.groups.keys().map(|k| ordinal_label(*k)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Total rows across every table.
    pub fn total_rows(&self) -> usize {
        self.groups
            .values()
            .flat_map(|tables| tables.iter().map(ResultTable::row_count))
            .sum()
    }
}
