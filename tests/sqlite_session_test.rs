//! Integration tests against real SQLite site databases.
//!
//! Tests verify that:
//! - Reads return declared columns and decoded values
//! - Empty reads still report their columns
//! - Writes are committed and report affected rows
//! - A driver error ends the site's batch with the right ordinal

use serde_json::json;
use sql_fanout::db::{ConnectionFactory, Session, SqlxConnectionFactory};
use sql_fanout::engine::{
    MemorySink, Orchestrator, RunRequest, SequentialRunner, SiteAccess, SiteOutcome,
    StatementSummary,
};
use sql_fanout::error::SiteError;
use sql_fanout::models::{
    Credentials, DatabaseType, RowSet, StatementBatch, StatementOutcome,
};
use sqlx::Connection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DB_FILE: &str = "store.db";

/// Create a site directory holding a seeded SQLite database.
async fn setup_site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join(DB_FILE))
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    sqlx::raw_sql(
        "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price REAL);
         INSERT INTO items (id, name, price) VALUES (1, 'apple', 1.5), (2, 'pear', NULL);",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();
    dir
}

fn access(dir: &Path) -> SiteAccess {
    SiteAccess::new(Credentials::new("sa", "pw", DB_FILE))
        .with_host_override(Some(dir.to_str().unwrap().to_string()))
        .with_backend(DatabaseType::SQLite, None)
}

fn orchestrator() -> (Orchestrator, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(
        Arc::new(SqlxConnectionFactory::new(5, 30)),
        Box::new(SequentialRunner),
        sink.clone(),
    );
    (orchestrator, sink)
}

#[tokio::test]
async fn test_session_reads_and_writes() {
    let dir = setup_site().await;
    let target = access(dir.path()).target("13100").unwrap();
    let mut session = SqlxConnectionFactory::default().open(&target).await.unwrap();

    let batch = StatementBatch::parse(
        "SELECT id, name, price FROM items ORDER BY id;
         UPDATE items SET name = 'quince' WHERE id = 2;
         SELECT id FROM items WHERE id < 0",
    )
    .unwrap();
    let statements = batch.statements();

    let first = session.execute(&statements[0]).await.unwrap();
    assert_eq!(
        first,
        StatementOutcome::Read(RowSet::new(
            vec!["id".into(), "name".into(), "price".into()],
            vec![
                vec![json!(1), json!("apple"), json!(1.5)],
                vec![json!(2), json!("pear"), json!(null)],
            ],
        ))
    );

    let write = session.execute(&statements[1]).await.unwrap();
    assert_eq!(write, StatementOutcome::Write { rows_affected: 1 });

    match session.execute(&statements[2]).await.unwrap() {
        StatementOutcome::Read(set) => {
            assert!(set.is_empty());
            assert_eq!(set.columns, vec!["id"]);
        }
        other => panic!("expected read outcome, got {:?}", other),
    }

    session.close().await;
}

#[tokio::test]
async fn test_write_is_committed() {
    let dir = setup_site().await;
    let (orchestrator, _sink) = orchestrator();

    let request = RunRequest::new(
        StatementBatch::parse("DELETE FROM items WHERE id = 1").unwrap(),
        access(dir.path()),
    );
    let report = orchestrator.run(&["13100".to_string()], &request).await;
    assert!(report.sites[0].outcome.is_success());

    // A fresh session sees the committed change.
    let request = RunRequest::new(
        StatementBatch::parse("SELECT COUNT(*) AS n FROM items").unwrap(),
        access(dir.path()),
    );
    let report = orchestrator.run(&["13100".to_string()], &request).await;
    let table = &report.results.by_label("Q1").unwrap()[0];
    assert_eq!(table.rows[0], vec![json!("13100"), json!(1)]);
}

#[tokio::test]
async fn test_run_against_sqlite_sites() {
    let dir = setup_site().await;
    let (orchestrator, sink) = orchestrator();

    let request = RunRequest::new(
        StatementBatch::parse(
            "SELECT name FROM items ORDER BY id;
             UPDATE items SET price = 2.0 WHERE id = 1;
             SELECT * FROM missing_table;
             SELECT 1",
        )
        .unwrap(),
        access(dir.path()),
    );
    let sites = vec!["13100".to_string(), "13200".to_string()];
    let report = orchestrator.run(&sites, &request).await;

    for site in &report.sites {
        match &site.outcome {
            SiteOutcome::Aborted { completed, error } => {
                assert_eq!(
                    completed,
                    &vec![
                        StatementSummary::Read { ordinal: 1, rows: 2 },
                        StatementSummary::Write {
                            ordinal: 2,
                            affected: 1
                        },
                    ]
                );
                assert!(matches!(error, SiteError::Statement { ordinal: 3, .. }));
                assert!(error.to_string().contains("missing_table"));
            }
            other => panic!("expected aborted site, got {:?}", other),
        }
    }

    let q1 = report.results.by_label("Q1").unwrap();
    assert_eq!(q1.len(), 2);
    assert_eq!(q1[0].columns, vec!["SiteID", "name"]);
    assert_eq!(q1[1].rows[1], vec![json!("13200"), json!("pear")]);
    assert!(report.results.by_label("Q4").is_none());

    let lines = sink.lines();
    assert!(lines.contains(&"name".to_string()));
    assert!(lines.contains(&"apple".to_string()));
    assert!(
        lines
            .iter()
            .any(|l| l.starts_with("Error processing Site ID 13200: Query 3 failed:"))
    );
}

#[tokio::test]
async fn test_missing_database_file_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, _sink) = orchestrator();

    let request = RunRequest::new(StatementBatch::parse("SELECT 1").unwrap(), access(dir.path()));
    let report = orchestrator.run(&["13100".to_string()], &request).await;

    match &report.sites[0].outcome {
        SiteOutcome::ConnectFailed(error) => assert!(error.is_unreachable()),
        other => panic!("expected connection failure, got {:?}", other),
    }
    assert!(report.results.is_empty());
}

#[tokio::test]
async fn test_probe_sqlite_site() {
    let dir = setup_site().await;
    let (orchestrator, _sink) = orchestrator();

    let host = orchestrator.probe("13100", &access(dir.path())).await.unwrap();
    assert_eq!(host, dir.path().to_str().unwrap());
}
