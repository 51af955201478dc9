//! In-memory workbook rendering.

use crate::models::{ResultGroup, ResultTable, ordinal_label};
use rust_xlsxwriter::{ColNum, Format, RowNum, Workbook, Worksheet, XlsxError};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Longest sheet name the xlsx format accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Sheet name for an ordinal label, truncated to [`MAX_SHEET_NAME_LEN`] chars.
pub fn sheet_name(label: &str) -> String {
    label.chars().take(MAX_SHEET_NAME_LEN).collect()
}

/// Render every group of `results` as one sheet, in ordinal order.
pub fn render(results: &ResultGroup) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for (ordinal, tables) in results.iter() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name(&ordinal_label(ordinal)))?;
        write_group(worksheet, tables, &header_format)?;
    }

    workbook.save_to_buffer()
}

/// Column key that keeps repeated names apart: (name, nth occurrence).
type ColumnKey<'a> = (&'a str, usize);

fn column_keys(columns: &[String]) -> Vec<ColumnKey<'_>> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    columns
        .iter()
        .map(|name| {
            let nth = seen.entry(name.as_str()).or_insert(0);
            let key = (name.as_str(), *nth);
            *nth += 1;
            key
        })
        .collect()
}

/// Union of the tables' columns in first-seen order.
fn merged_columns(tables: &[ResultTable]) -> Vec<ColumnKey<'_>> {
    let mut merged: Vec<ColumnKey<'_>> = Vec::new();
    for table in tables {
        for key in column_keys(&table.columns) {
            if !merged.contains(&key) {
                merged.push(key);
            }
        }
    }
    merged
}

fn write_group(
    worksheet: &mut Worksheet,
    tables: &[ResultTable],
    header_format: &Format,
) -> Result<(), XlsxError> {
    let merged = merged_columns(tables);
    for (col, (name, _)) in merged.iter().enumerate() {
        worksheet.write_string_with_format(0, col as ColNum, *name, header_format)?;
    }

    let mut row_num: RowNum = 1;
    for table in tables {
        // Position of each of this table's columns in the sheet.
        let placement: Vec<usize> = column_keys(&table.columns)
            .iter()
            .map(|key| merged.iter().position(|m| m == key).unwrap_or_default())
            .collect();

        for row in &table.rows {
            for (value, col) in row.iter().zip(&placement) {
                write_cell(worksheet, row_num, *col as ColNum, value)?;
            }
            row_num += 1;
        }
    }

    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    value: &JsonValue,
) -> Result<(), XlsxError> {
    match value {
        JsonValue::Null => {}
        JsonValue::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) => {
                worksheet.write_number(row, col, f)?;
            }
            None => {
                worksheet.write_string(row, col, n.to_string())?;
            }
        },
        JsonValue::String(s) => {
            worksheet.write_string(row, col, s)?;
        }
        other => {
            worksheet.write_string(row, col, other.to_string())?;
        }
    }
    Ok(())
}
