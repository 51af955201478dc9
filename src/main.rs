//! sql-fanout - main entry point.
//!
//! Runs a batch of SQL statements against every site given on the command
//! line or in a site file, prints per-site progress to stdout and exports
//! the read results as one workbook.

use clap::Parser;
use sql_fanout::config::Config;
use sql_fanout::db::SqlxConnectionFactory;
use sql_fanout::engine::{Orchestrator, RunRequest, SiteAccess, StdoutSink, runner_for};
use sql_fanout::error::ExportError;
use sql_fanout::export::ReportExporter;
use sql_fanout::models::StatementBatch;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so they never mix with the progress stream on stdout.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after in-flight statements");
            token.cancel();
        }
    });
}

async fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let access = SiteAccess::new(config.credentials())
        .with_host_override(config.host_override())
        .with_backend(config.backend, config.port);

    let factory = Arc::new(SqlxConnectionFactory::new(
        config.connect_timeout,
        config.query_timeout,
    ));
    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(factory, runner_for(config.concurrency), Arc::new(StdoutSink))
        .with_cancellation(cancel.clone())
        .keep_site_order(config.keep_site_order);

    if config.probe {
        let site_id = config.site.clone().unwrap_or_default();
        let host = orchestrator.probe(&site_id, &access).await?;
        println!("Connection successful to {}", host);
        return Ok(());
    }

    // Run-level input errors surface here, before any site is contacted.
    let batch = StatementBatch::parse(&config.query_text()?)?;
    let sites = config.site_source().load()?;
    let request = RunRequest::new(batch, access).with_report_date(config.date);

    cancel_on_interrupt(cancel);
    let report = orchestrator.run(&sites, &request).await;

    for site in report.failed_sites() {
        if let Some(suggestion) = site.outcome.error().and_then(|e| e.suggestion()) {
            info!(site_id = %site.site_id, suggestion, "Hint");
        }
    }

    if !report.exportable {
        println!("No SELECT statements in the batch; nothing to export.");
        return Ok(());
    }
    if config.no_export {
        return Ok(());
    }

    let destination = config.output_dir_or_default();
    match ReportExporter::new().export(&report.results, &destination) {
        Ok(path) => println!("Results exported to {}", path.display()),
        Err(ExportError::NothingToExport) => println!("No results to export."),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!("Starting sql-fanout v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config).await {
        error!(error = %e, "Run failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
