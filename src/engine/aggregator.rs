//! Cross-site accumulation of read results.
//!
//! One [`ResultAggregator`] is created per run and dropped with it. `add` is
//! safe for concurrent callers; every entry remembers the submission index
//! of the site that produced it so a concurrent run can restore site order.

use crate::models::{ResultGroup, ResultTable};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
struct Entry {
    site_index: usize,
    table: ResultTable,
}

/// Accumulates [`ResultTable`]s keyed by statement ordinal.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    groups: Mutex<BTreeMap<usize, Vec<Entry>>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `table` under `ordinal`. No deduplication.
    pub fn add(&self, ordinal: usize, site_index: usize, table: ResultTable) {
        debug!(
            ordinal,
            site_id = %table.origin_site,
            rows = table.row_count(),
            "Aggregating result table"
        );
        let mut groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        groups
            .entry(ordinal)
            .or_default()
            .push(Entry { site_index, table });
    }

    /// The accumulated mapping in insertion order.
    pub fn snapshot(&self) -> ResultGroup {
        let groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        let map = groups
            .iter()
            .map(|(ordinal, entries)| {
                let tables = entries.iter().map(|e| e.table.clone()).collect();
                (*ordinal, tables)
            })
            .collect();
        ResultGroup::from_map(map)
    }

    /// The accumulated mapping with each ordinal's tables in site submission
    /// order rather than completion order.
    pub fn snapshot_in_site_order(&self) -> ResultGroup {
        let groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        let map = groups
            .iter()
            .map(|(ordinal, entries)| {
                let mut ordered: Vec<&Entry> = entries.iter().collect();
                ordered.sort_by_key(|e| e.site_index);
                let tables = ordered.into_iter().map(|e| e.table.clone()).collect();
                (*ordinal, tables)
            })
            .collect();
        ResultGroup::from_map(map)
    }

    pub fn is_empty(&self) -> bool {
        self.groups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}
