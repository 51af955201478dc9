//! Site batch runners.
//!
//! [`SiteJob::run`] drives one site through
//! `Connecting -> Executing(i) -> Done | Failed | Cancelled`.
//! A [`SiteBatchRunner`] decides how the sites of a run are scheduled.

use crate::db::ConnectionFactory;
use crate::engine::aggregator::ResultAggregator;
use crate::engine::orchestrator::RunRequest;
use crate::engine::progress::{ProgressLog, ProgressSink};
use crate::engine::repair::repair;
use crate::engine::report::{SiteOutcome, SiteReport, StatementSummary};
use crate::error::SiteError;
use crate::models::{ResultTable, RowSet, StatementOutcome};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

/// Shared, read-only context for every site of one run.
pub struct SiteJob<'a> {
    pub factory: &'a dyn ConnectionFactory,
    pub request: &'a RunRequest,
    pub aggregator: &'a ResultAggregator,
    pub sink: &'a dyn ProgressSink,
    pub cancel: &'a CancellationToken,
}

impl SiteJob<'_> {
    /// Run the whole batch on one site. Never fails; every error ends up in
    /// the returned report and in the site's progress block.
    pub async fn run(&self, index: usize, site_id: &str) -> SiteReport {
        let span = info_span!("site", site_id = %site_id, index);
        async {
            let mut log = ProgressLog::new();
            log.site_started(site_id);
            let (host, outcome) = self.drive(index, site_id, &mut log).await;
            log.flush_to(self.sink);
            SiteReport {
                index,
                site_id: site_id.to_string(),
                host,
                outcome,
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        index: usize,
        site_id: &str,
        log: &mut ProgressLog,
    ) -> (Option<String>, SiteOutcome) {
        if self.cancel.is_cancelled() {
            log.cancelled(site_id);
            return (None, SiteOutcome::Cancelled { completed: Vec::new() });
        }

        // Connecting
        let target = match self.request.access.target(site_id) {
            Ok(target) => target,
            Err(e) => {
                let error = SiteError::from(e);
                warn!(error = %error, "Site skipped");
                log.site_failed(site_id, &error);
                return (None, SiteOutcome::ConnectFailed(error));
            }
        };
        let host = target.host.clone();

        let mut session = match self.factory.open(&target).await {
            Ok(session) => session,
            Err(error) => {
                warn!(host = %host, error = %error, "Site unreachable");
                log.site_failed(site_id, &error);
                return (Some(host), SiteOutcome::ConnectFailed(error));
            }
        };

        // Executing(i)
        let mut completed = Vec::with_capacity(self.request.batch.len());
        let mut failure = None;
        let mut cancelled = false;

        for statement in &self.request.batch {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let ordinal = statement.ordinal();
            log.statement_started(ordinal);

            match session.execute(statement).await {
                Ok(StatementOutcome::Read(row_set)) => {
                    let rows = repair(&row_set.columns, row_set.rows);
                    let row_set = RowSet::new(row_set.columns, rows);
                    log.read_preview(&row_set);
                    completed.push(StatementSummary::Read {
                        ordinal,
                        rows: row_set.row_count(),
                    });
                    self.aggregator
                        .add(ordinal, index, ResultTable::tagged(site_id, row_set));
                }
                Ok(StatementOutcome::Write { rows_affected }) => {
                    log.rows_affected(rows_affected);
                    completed.push(StatementSummary::Write {
                        ordinal,
                        affected: rows_affected,
                    });
                }
                Err(e) => {
                    let error = SiteError::statement(ordinal, e);
                    warn!(ordinal, error = %error, "Statement failed; skipping rest of site");
                    log.site_failed(site_id, &error);
                    failure = Some(error);
                    break;
                }
            }
        }

        session.close().await;

        // Done | Failed | Cancelled
        let outcome = if let Some(error) = failure {
            SiteOutcome::Aborted { completed, error }
        } else if cancelled {
            info!(completed = completed.len(), "Site cancelled");
            log.cancelled(site_id);
            SiteOutcome::Cancelled { completed }
        } else {
            if let Some(date) = self.request.report_date {
                log.report_date(date);
            }
            debug!(statements = completed.len(), "Site done");
            SiteOutcome::Completed(completed)
        };

        (Some(host), outcome)
    }
}

/// Schedules the sites of one run.
#[async_trait]
pub trait SiteBatchRunner: Send + Sync {
    /// Run every site and return the reports in submission order.
    async fn run_sites(&self, job: &SiteJob<'_>, sites: &[String]) -> Vec<SiteReport>;

    /// Whether aggregated tables may arrive out of site order.
    fn reorders(&self) -> bool {
        false
    }
}

/// One site at a time, in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialRunner;

#[async_trait]
impl SiteBatchRunner for SequentialRunner {
    async fn run_sites(&self, job: &SiteJob<'_>, sites: &[String]) -> Vec<SiteReport> {
        let mut reports = Vec::with_capacity(sites.len());
        for (index, site_id) in sites.iter().enumerate() {
            reports.push(job.run(index, site_id).await);
        }
        reports
    }
}

/// Up to `max_in_flight` sites at once.
///
/// Aggregated tables land in completion order; reports are re-sorted by
/// submission index before they are returned.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentRunner {
    max_in_flight: usize,
}

impl ConcurrentRunner {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

#[async_trait]
impl SiteBatchRunner for ConcurrentRunner {
    async fn run_sites(&self, job: &SiteJob<'_>, sites: &[String]) -> Vec<SiteReport> {
        let site_runs: Vec<_> = sites
            .iter()
            .enumerate()
            .map(|(index, site_id)| job.run(index, site_id))
            .collect();
        let mut reports: Vec<SiteReport> = stream::iter(site_runs)
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;
        reports.sort_by_key(|report| report.index);
        reports
    }

    fn reorders(&self) -> bool {
        self.max_in_flight > 1
    }
}

/// Pick a runner for the requested concurrency.
pub fn runner_for(concurrency: usize) -> Box<dyn SiteBatchRunner> {
    if concurrency <= 1 {
        Box::new(SequentialRunner)
    } else {
        Box::new(ConcurrentRunner::new(concurrency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_selection() {
        assert!(!runner_for(1).reorders());
        assert!(!runner_for(0).reorders());
        assert!(runner_for(4).reorders());
        assert_eq!(ConcurrentRunner::new(0).max_in_flight(), 1);
    }
}
