//! Per-site and per-run outcome values.
//!
//! Site- and statement-scoped failures live here as data. Nothing in this
//! module aborts a run.

use crate::error::SiteError;
use crate::models::ResultGroup;

/// What one statement did on one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementSummary {
    Read { ordinal: usize, rows: usize },
    Write { ordinal: usize, affected: u64 },
}

impl StatementSummary {
    pub fn ordinal(&self) -> usize {
        match self {
            Self::Read { ordinal, .. } | Self::Write { ordinal, .. } => *ordinal,
        }
    }
}

/// Terminal state of one site.
#[derive(Debug)]
pub enum SiteOutcome {
    /// Never reached: bad site ID or the session could not be opened.
    ConnectFailed(SiteError),
    /// Every statement ran.
    Completed(Vec<StatementSummary>),
    /// A statement failed; `completed` holds what ran before it.
    Aborted {
        completed: Vec<StatementSummary>,
        error: SiteError,
    },
    /// Cancellation was observed before the batch finished.
    Cancelled { completed: Vec<StatementSummary> },
}

impl SiteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn error(&self) -> Option<&SiteError> {
        match self {
            Self::ConnectFailed(error) | Self::Aborted { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Statements that finished on this site.
    pub fn completed(&self) -> &[StatementSummary] {
        match self {
            Self::ConnectFailed(_) => &[],
            Self::Completed(completed)
            | Self::Aborted { completed, .. }
            | Self::Cancelled { completed } => completed,
        }
    }
}

/// One site's result.
#[derive(Debug)]
pub struct SiteReport {
    /// Position in the site sequence.
    pub index: usize,
    pub site_id: String,
    /// Resolved host, when resolution succeeded.
    pub host: Option<String>,
    pub outcome: SiteOutcome,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    /// In site submission order.
    pub sites: Vec<SiteReport>,
    pub results: ResultGroup,
    /// True when the batch contains at least one read statement.
    pub exportable: bool,
}

impl RunReport {
    pub fn failed_sites(&self) -> impl Iterator<Item = &SiteReport> {
        self.sites.iter().filter(|s| s.outcome.error().is_some())
    }

    pub fn succeeded_sites(&self) -> impl Iterator<Item = &SiteReport> {
        self.sites.iter().filter(|s| s.outcome.is_success())
    }

    pub fn was_cancelled(&self) -> bool {
        self.sites
            .iter()
            .any(|s| matches!(s.outcome, SiteOutcome::Cancelled { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(index: usize, outcome: SiteOutcome) -> SiteReport {
        SiteReport {
            index,
            site_id: format!("S{}", index),
            host: None,
            outcome,
        }
    }

    #[test]
    fn test_report_partitions_sites() {
        let report = RunReport {
            run_id: "r".into(),
            sites: vec![
                site(0, SiteOutcome::ConnectFailed(SiteError::connection("h", "m", "s"))),
                site(
                    1,
                    SiteOutcome::Completed(vec![StatementSummary::Read { ordinal: 1, rows: 2 }]),
                ),
                site(2, SiteOutcome::Cancelled { completed: vec![] }),
            ],
            results: ResultGroup::default(),
            exportable: true,
        };

        let failed: Vec<_> = report.failed_sites().map(|s| s.index).collect();
        let ok: Vec<_> = report.succeeded_sites().map(|s| s.index).collect();
        assert_eq!(failed, vec![0]);
        assert_eq!(ok, vec![1]);
        assert!(report.was_cancelled());
        assert_eq!(report.sites[1].outcome.completed()[0].ordinal(), 1);
    }
}
