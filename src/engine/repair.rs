//! Repair of rows that arrive as one delimited string.
//!
//! Some query/driver combinations return a multi-column result as a single
//! comma-joined text value per row. This is a best-effort heuristic:
//!
//! 1. Repair is only attempted when the *first* row has exactly one field
//!    while more than one column is declared.
//! 2. Each row is then judged on its own. A single text cell whose split
//!    yields exactly `columns.len()` parts is replaced by the parts; any
//!    other row is left as it came.
//!
//! A table whose first row already matches the declared arity is never
//! touched, even if later rows are single strings.

use crate::models::Row;
use serde_json::Value as JsonValue;

/// Delimiter used to split a collapsed row.
pub const REPAIR_DELIMITER: char = ',';

/// Repair collapsed rows against the declared `columns`.
pub fn repair(columns: &[String], rows: Vec<Row>) -> Vec<Row> {
    if !needs_repair(columns, &rows) {
        return rows;
    }

    rows.into_iter()
        .map(|row| split_row(columns.len(), row))
        .collect()
}

/// First-row gate.
fn needs_repair(columns: &[String], rows: &[Row]) -> bool {
    match rows.first() {
        Some(first) => first.len() == 1 && columns.len() > 1,
        None => false,
    }
}

fn split_row(arity: usize, row: Row) -> Row {
    let parts: Vec<&str> = match row.as_slice() {
        [JsonValue::String(text)] => text.split(REPAIR_DELIMITER).collect(),
        _ => return row,
    };

    if parts.len() != arity {
        return row;
    }

    parts
        .into_iter()
        .map(|part| JsonValue::String(part.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_repair_splits_matching_row() {
        let rows = vec![vec![json!("x,y")]];
        assert_eq!(
            repair(&cols(&["a", "b"]), rows),
            vec![vec![json!("x"), json!("y")]]
        );
    }

    #[test]
    fn test_repair_declines_on_count_mismatch() {
        let rows = vec![vec![json!("x,y,z")]];
        assert_eq!(repair(&cols(&["a", "b"]), rows.clone()), rows);
    }

    #[test]
    fn test_repair_skips_matching_arity() {
        let rows = vec![vec![json!("x"), json!("y")]];
        assert_eq!(repair(&cols(&["a"]), rows.clone()), rows);

        let rows = vec![vec![json!("x,y")]];
        assert_eq!(repair(&cols(&["a"]), rows.clone()), rows);
    }

    #[test]
    fn test_repair_judges_each_row() {
        let rows = vec![
            vec![json!("1,2,3")],
            vec![json!("4,5")],
            vec![json!(7)],
            vec![json!("8,9,10")],
        ];
        let repaired = repair(&cols(&["a", "b", "c"]), rows);
        assert_eq!(repaired[0], vec![json!("1"), json!("2"), json!("3")]);
        assert_eq!(repaired[1], vec![json!("4,5")]);
        assert_eq!(repaired[2], vec![json!(7)]);
        assert_eq!(repaired[3], vec![json!("8"), json!("9"), json!("10")]);
    }

    #[test]
    fn test_repair_first_row_gate_is_kept() {
        // First row already wide: later collapsed rows stay as they are.
        let rows = vec![vec![json!("x"), json!("y")], vec![json!("p,q")]];
        assert_eq!(repair(&cols(&["a", "b"]), rows.clone()), rows);
    }

    #[test]
    fn test_repair_non_text_cell_untouched() {
        let rows = vec![vec![json!(null)], vec![json!(12)]];
        assert_eq!(repair(&cols(&["a", "b"]), rows.clone()), rows);
    }

    #[test]
    fn test_repair_empty_rows() {
        assert!(repair(&cols(&["a", "b"]), Vec::new()).is_empty());
    }
}
