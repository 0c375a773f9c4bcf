use super::sink::SinkHandle;
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

const RULE_WIDTH: usize = 80;

/// A single item that did not succeed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    /// Position of the item in the full batch
    pub index: usize,
    pub error: String,
}

/// What one worker did with its range
#[derive(Debug, Serialize)]
pub struct WorkerSummary {
    pub worker_id: usize,

    pub display_name: String,

    /// Indices assigned to this worker
    pub range: Range<usize>,

    /// Items dequeued, whatever their outcome
    pub processed: usize,

    pub successful: usize,

    pub failed: usize,

    /// Items never dequeued because the worker stopped early
    pub unprocessed: usize,

    pub failures: Vec<ItemFailure>,

    /// Closed sink; taken by the merger once merged
    #[serde(skip)]
    pub sink: Option<SinkHandle>,

    pub elapsed: Duration,

    /// Set when the worker stopped on an error outside the per-item guard
    pub fatal: Option<String>,
}

impl WorkerSummary {
    pub fn new(worker_id: usize, display_name: impl Into<String>, range: Range<usize>) -> Self {
        Self {
            worker_id,
            display_name: display_name.into(),
            range,
            processed: 0,
            successful: 0,
            failed: 0,
            unprocessed: 0,
            failures: Vec::new(),
            sink: None,
            elapsed: Duration::ZERO,
            fatal: None,
        }
    }

    /// Summary for a worker that never got to run any item
    pub fn fatal(
        worker_id: usize,
        display_name: impl Into<String>,
        range: Range<usize>,
        error: impl Into<String>,
    ) -> Self {
        let mut summary = Self::new(worker_id, display_name, range);
        summary.unprocessed = summary.assigned();
        summary.fatal = Some(error.into());
        summary
    }

    pub fn assigned(&self) -> usize {
        self.range.len()
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    pub(crate) fn record_success(&mut self) {
        self.processed += 1;
        self.successful += 1;
    }

    pub(crate) fn record_failure(&mut self, index: usize, error: String) {
        self.processed += 1;
        self.failed += 1;
        self.failures.push(ItemFailure { index, error });
    }

    /// Turn counted successes into failures when their records were lost
    /// with the worker's sink
    pub(crate) fn revoke_successes(&mut self, indices: &[usize], reason: &str) {
        for &index in indices {
            self.successful = self.successful.saturating_sub(1);
            self.failed += 1;
            self.failures.push(ItemFailure {
                index,
                error: reason.to_string(),
            });
        }
        self.failures.sort_by_key(|f| f.index);
    }
}

/// Terminal summary of a batch run
#[derive(Debug, Serialize)]
pub struct FinalReport {
    pub job: String,
    pub total_items: usize,
    pub total_processed: usize,
    pub total_successful: usize,
    pub total_failed: usize,
    pub total_unprocessed: usize,
    pub worker_summaries: Vec<WorkerSummary>,
    pub output_path: PathBuf,
    pub rows_written: usize,
    pub elapsed: Duration,
    /// The run was interrupted before every worker finished its range
    pub cancelled: bool,
}

impl FinalReport {
    pub fn summarize(
        job: impl Into<String>,
        total_items: usize,
        mut worker_summaries: Vec<WorkerSummary>,
        output_path: PathBuf,
        rows_written: usize,
        elapsed: Duration,
    ) -> Self {
        worker_summaries.sort_by_key(|s| s.worker_id);

        let total_processed = worker_summaries.iter().map(|s| s.processed).sum();
        let total_successful = worker_summaries.iter().map(|s| s.successful).sum();
        let total_failed = worker_summaries.iter().map(|s| s.failed).sum();
        let total_unprocessed = worker_summaries.iter().map(|s| s.unprocessed).sum();

        Self {
            job: job.into(),
            total_items,
            total_processed,
            total_successful,
            total_failed,
            total_unprocessed,
            worker_summaries,
            output_path,
            rows_written,
            elapsed,
            cancelled: false,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_summaries.len()
    }

    /// Percentage of all items that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.total_items == 0 {
            0.0
        } else {
            self.total_successful as f64 / self.total_items as f64 * 100.0
        }
    }

    pub fn fatal_workers(&self) -> impl Iterator<Item = &WorkerSummary> {
        self.worker_summaries.iter().filter(|s| s.is_fatal())
    }

    /// Every item failure across workers, in batch order
    pub fn failures(&self) -> Vec<&ItemFailure> {
        let mut failures: Vec<&ItemFailure> = self
            .worker_summaries
            .iter()
            .flat_map(|s| s.failures.iter())
            .collect();
        failures.sort_by_key(|f| f.index);
        failures
    }

    pub fn is_clean(&self) -> bool {
        self.total_failed == 0
            && self.total_unprocessed == 0
            && !self.cancelled
            && self.fatal_workers().next().is_none()
    }
}

impl fmt::Display for FinalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(f, "{}", rule)?;
        writeln!(f, "{} COMPLETED", self.job.to_uppercase())?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Output file: {}", self.output_path.display())?;
        writeln!(f, "Total items: {}", self.total_items)?;
        writeln!(f, "Workers used: {}", self.worker_count())?;
        writeln!(f, "Elapsed: {:.1}s", self.elapsed.as_secs_f64())?;
        writeln!(f)?;

        for summary in &self.worker_summaries {
            write!(
                f,
                "{}: {} successful, {} failed, {} processed",
                summary.display_name, summary.successful, summary.failed, summary.processed
            )?;
            if summary.unprocessed > 0 {
                write!(f, ", {} not processed", summary.unprocessed)?;
            }
            writeln!(f)?;
            if let Some(fatal) = &summary.fatal {
                writeln!(f, "    stopped early: {}", fatal)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Total successful: {}", self.total_successful)?;
        writeln!(f, "Total failed: {}", self.total_failed)?;
        if self.total_unprocessed > 0 {
            writeln!(f, "Not processed: {}", self.total_unprocessed)?;
        }
        writeln!(f, "Rows written: {}", self.rows_written)?;
        writeln!(f, "Success rate: {:.1}%", self.success_rate())?;
        writeln!(f, "{}", rule)?;

        if self.cancelled {
            write!(f, "Run interrupted; partial results were merged.")
        } else if self.is_clean() {
            write!(f, "Completed successfully.")
        } else {
            write!(f, "Completed with errors. Check the log file for details.")
        }
    }
}
