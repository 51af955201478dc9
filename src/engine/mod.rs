//! Multi-site execution engine.
//!
//! - [`orchestrator`]: run entry point and connection probe
//! - [`runner`]: per-site state machine and site scheduling
//! - [`repair`]: collapsed-row heuristic
//! - [`aggregator`]: cross-site grouping by statement ordinal
//! - [`progress`]: human-readable progress stream
//! - [`report`]: outcome values

pub mod aggregator;
pub mod orchestrator;
pub mod progress;
pub mod repair;
pub mod report;
pub mod runner;

pub use aggregator::ResultAggregator;
pub use orchestrator::{Orchestrator, RunRequest, SiteAccess};
pub use progress::{MemorySink, ProgressLog, ProgressSink, StdoutSink};
pub use repair::repair;
pub use report::{RunReport, SiteOutcome, SiteReport, StatementSummary};
pub use runner::{ConcurrentRunner, SequentialRunner, SiteBatchRunner, SiteJob, runner_for};
