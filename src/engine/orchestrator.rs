//! Run orchestration.
//!
//! An [`Orchestrator`] owns the collaborators of a run: the connection
//! factory, the site batch runner, the progress sink and the cancellation
//! token. Each call to [`Orchestrator::run`] builds a fresh aggregator, so
//! no state leaks from one run into the next.

use crate::db::ConnectionFactory;
use crate::engine::aggregator::ResultAggregator;
use crate::engine::progress::ProgressSink;
use crate::engine::report::RunReport;
use crate::engine::runner::{SiteBatchRunner, SiteJob};
use crate::error::{AddressFormatError, SiteError};
use crate::models::{ConnectionTarget, Credentials, DatabaseType, StatementBatch};
use crate::site;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

/// How sites are reached: shared credentials, backend and host override.
#[derive(Debug, Clone, Default)]
pub struct SiteAccess {
    pub credentials: Credentials,
    /// Used verbatim as the host for every site when set.
    pub host_override: Option<String>,
    pub db_type: DatabaseType,
    pub port: Option<u16>,
}

impl SiteAccess {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            ..Self::default()
        }
    }

    pub fn with_host_override(mut self, host: Option<String>) -> Self {
        self.host_override = host.filter(|h| !h.trim().is_empty());
        self
    }

    pub fn with_backend(mut self, db_type: DatabaseType, port: Option<u16>) -> Self {
        self.db_type = db_type;
        self.port = port;
        self
    }

    /// Resolve `site_id` into a connection target.
    pub fn target(&self, site_id: &str) -> Result<ConnectionTarget, AddressFormatError> {
        let host = site::resolve(site_id, self.host_override.as_deref())?;
        Ok(ConnectionTarget::new(
            self.db_type,
            host,
            self.port,
            &self.credentials,
        ))
    }
}

/// Immutable inputs of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub batch: StatementBatch,
    pub access: SiteAccess,
    pub report_date: Option<NaiveDate>,
}

impl RunRequest {
    pub fn new(batch: StatementBatch, access: SiteAccess) -> Self {
        Self {
            batch,
            access,
            report_date: None,
        }
    }

    pub fn with_report_date(mut self, date: Option<NaiveDate>) -> Self {
        self.report_date = date;
        self
    }
}

/// Drives the site x statement loop.
pub struct Orchestrator {
    factory: Arc<dyn ConnectionFactory>,
    runner: Box<dyn SiteBatchRunner>,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    keep_site_order: bool,
}

impl Orchestrator {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        runner: Box<dyn SiteBatchRunner>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            factory,
            runner,
            sink,
            cancel: CancellationToken::new(),
            keep_site_order: false,
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Re-sort aggregated tables by site submission order when the runner
    /// completes sites out of order.
    pub fn keep_site_order(mut self, keep: bool) -> Self {
        self.keep_site_order = keep;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `request` against every site in `sites`.
    ///
    /// Site and statement failures are recorded in the report; this never
    /// returns early because one site failed.
    pub async fn run(&self, sites: &[String], request: &RunRequest) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);

        async {
            let start = Instant::now();
            info!(
                sites = sites.len(),
                statements = request.batch.len(),
                backend = %request.access.db_type,
                "Starting run"
            );

            let aggregator = ResultAggregator::new();
            let job = SiteJob {
                factory: self.factory.as_ref(),
                request,
                aggregator: &aggregator,
                sink: self.sink.as_ref(),
                cancel: &self.cancel,
            };
            let reports = self.runner.run_sites(&job, sites).await;

            let results = if self.keep_site_order && self.runner.reorders() {
                aggregator.snapshot_in_site_order()
            } else {
                aggregator.snapshot()
            };

            let report = RunReport {
                run_id: run_id.clone(),
                sites: reports,
                results,
                exportable: request.batch.has_reads(),
            };

            let failed = report.failed_sites().count();
            if failed > 0 {
                warn!(failed, "Some sites did not complete");
            }
            info!(
                succeeded = report.succeeded_sites().count(),
                failed,
                groups = report.results.len(),
                rows = report.results.total_rows(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Run finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Open a session to one site and close it again.
    ///
    /// Returns the host that answered.
    pub async fn probe(&self, site_id: &str, access: &SiteAccess) -> Result<String, SiteError> {
        let target = access.target(site_id.trim())?;
        let session = self.factory.open(&target).await?;
        session.close().await;
        info!(site_id = %site_id, host = %target.host, "Connection test succeeded");
        Ok(target.host)
    }
}
