//! Integration tests for workbook export.
//!
//! Tests verify that:
//! - Repeated exports never overwrite each other
//! - Sheets are named by ordinal and keep column and row order
//! - Unusable destinations fail the export step only

use calamine::{Data, Reader, open_workbook_auto};
use serde_json::json;
use sql_fanout::engine::ResultAggregator;
use sql_fanout::error::ExportError;
use sql_fanout::export::ReportExporter;
use sql_fanout::models::{ResultGroup, ResultTable, RowSet};

fn sample_results() -> ResultGroup {
    let aggregator = ResultAggregator::new();
    aggregator.add(
        1,
        0,
        ResultTable::tagged(
            "13100",
            RowSet::new(
                vec!["id".into(), "name".into(), "active".into()],
                vec![
                    vec![json!(1), json!("apple"), json!(true)],
                    vec![json!(2), json!(null), json!(false)],
                ],
            ),
        ),
    );
    aggregator.add(
        1,
        1,
        ResultTable::tagged(
            "13200",
            RowSet::new(
                vec!["id".into(), "name".into(), "active".into()],
                vec![vec![json!(3), json!("pear"), json!(true)]],
            ),
        ),
    );
    aggregator.add(
        3,
        0,
        ResultTable::tagged("13100", RowSet::new(vec!["total".into()], vec![vec![json!(2.5)]])),
    );
    aggregator.snapshot()
}

#[test]
fn test_export_never_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = ReportExporter::new();
    let results = sample_results();

    let first = exporter.export(&results, dir.path()).unwrap();
    let first_len = std::fs::metadata(&first).unwrap().len();
    let second = exporter.export(&results, dir.path()).unwrap();
    let third = exporter.export(&results, dir.path()).unwrap();

    assert_eq!(first.file_name().unwrap(), "query.xlsx");
    assert_eq!(second.file_name().unwrap(), "query1.xlsx");
    assert_eq!(third.file_name().unwrap(), "query2.xlsx");
    assert_eq!(std::fs::metadata(&first).unwrap().len(), first_len);
}

#[test]
fn test_export_skips_foreign_file_with_base_name() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("query.xlsx"), b"not a workbook").unwrap();

    let path = ReportExporter::new()
        .export(&sample_results(), dir.path())
        .unwrap();

    assert_eq!(path.file_name().unwrap(), "query1.xlsx");
    assert_eq!(
        std::fs::read(dir.path().join("query.xlsx")).unwrap(),
        b"not a workbook"
    );
}

#[test]
fn test_export_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = ReportExporter::new()
        .export(&sample_results(), dir.path())
        .unwrap();

    let mut workbook = open_workbook_auto(&path).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["Q1", "Q3"]);

    let q1 = workbook.worksheet_range("Q1").unwrap();
    let rows: Vec<Vec<Data>> = q1.rows().map(|r| r.to_vec()).collect();
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[0],
        vec![
            Data::String("SiteID".into()),
            Data::String("id".into()),
            Data::String("name".into()),
            Data::String("active".into()),
        ]
    );
    assert_eq!(
        rows[1],
        vec![
            Data::String("13100".into()),
            Data::Float(1.0),
            Data::String("apple".into()),
            Data::Bool(true),
        ]
    );
    // NULL is written as an empty cell
    assert_eq!(rows[2][2], Data::Empty);
    assert_eq!(rows[3][0], Data::String("13200".into()));

    let q3 = workbook.worksheet_range("Q3").unwrap();
    assert_eq!(q3.get_value((0, 1)), Some(&Data::String("total".into())));
    assert_eq!(q3.get_value((1, 1)), Some(&Data::Float(2.5)));
}

#[test]
fn test_export_merges_differing_columns() {
    let aggregator = ResultAggregator::new();
    aggregator.add(
        1,
        0,
        ResultTable::tagged("A", RowSet::new(vec!["x".into()], vec![vec![json!("a")]])),
    );
    aggregator.add(
        1,
        1,
        ResultTable::tagged(
            "B",
            RowSet::new(vec!["y".into(), "x".into()], vec![vec![json!("b"), json!("c")]]),
        ),
    );

    let dir = tempfile::tempdir().unwrap();
    let path = ReportExporter::new()
        .export(&aggregator.snapshot(), dir.path())
        .unwrap();

    let mut workbook = open_workbook_auto(&path).unwrap();
    let range = workbook.worksheet_range("Q1").unwrap();
    let header: Vec<Data> = range.rows().next().unwrap().to_vec();
    assert_eq!(
        header,
        vec![
            Data::String("SiteID".into()),
            Data::String("x".into()),
            Data::String("y".into()),
        ]
    );
    assert_eq!(range.get_value((2, 1)), Some(&Data::String("c".into())));
    assert_eq!(range.get_value((2, 2)), Some(&Data::String("b".into())));
}

#[test]
fn test_export_creates_destination() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("reports").join("march");

    let path = ReportExporter::with_basename("fleet")
        .export(&sample_results(), &nested)
        .unwrap();

    assert_eq!(path, nested.join("fleet.xlsx"));
    assert!(path.exists());
}

#[test]
fn test_export_to_file_path_fails() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let results = sample_results();

    let err = ReportExporter::new()
        .export(&results, file.path())
        .unwrap_err();

    assert!(matches!(err, ExportError::Destination { .. }));
    // Results are untouched and can be exported elsewhere.
    let dir = tempfile::tempdir().unwrap();
    assert!(ReportExporter::new().export(&results, dir.path()).is_ok());
}

#[test]
fn test_export_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let err = ReportExporter::new()
        .export(&ResultGroup::default(), dir.path())
        .unwrap_err();
    assert!(matches!(err, ExportError::NothingToExport));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
