//! Parallel batch engine.
//!
//! A batch of items is split into contiguous ranges, each range is processed
//! on its own OS thread with its own API client and output sink, and the
//! sinks are merged into one sorted CSV once every worker has returned.

pub mod context;
pub mod merge;
pub mod partition;
pub mod processor;
pub mod progress;
pub mod report;
pub mod scheduler;
pub mod shutdown;
pub mod sink;

pub use context::WorkerContext;
pub use merge::{sort_keys, ResultMerger};
pub use partition::PartitionPlan;
pub use processor::{invoke, ItemContext, ItemOutcome, ItemProcessor};
pub use progress::{
    worker_display_name, NoProgress, ProgressReporter, ProgressSink, TerminalProgress,
};
pub use report::{FinalReport, ItemFailure, WorkerSummary};
pub use scheduler::WorkerPool;
pub use shutdown::ShutdownSignal;
pub use sink::{Record, SinkFactory, SinkHandle, SpoolFile, WorkerSink};

use crate::client::ClientFactory;
use crate::config::EngineConfig;
use crate::error::{MigrationError, Result};
use crate::metrics;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Description of one batch run: what to call it and where its output goes
pub struct BatchJob<S> {
    pub name: String,
    /// First row of the output file; omitted when empty
    pub header: Vec<String>,
    pub output_path: PathBuf,
    /// Key used to order the merged rows
    pub sort_key: S,
}

impl<S> BatchJob<S> {
    pub fn new<H, V>(
        name: impl Into<String>,
        header: H,
        output_path: impl Into<PathBuf>,
        sort_key: S,
    ) -> Self
    where
        H: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            header: header.into_iter().map(Into::into).collect(),
            output_path: output_path.into(),
            sort_key,
        }
    }
}

/// Runs batch jobs with a fixed engine configuration and client factory
pub struct MigrationEngine<F> {
    config: EngineConfig,
    factory: F,
    progress: Box<dyn ProgressSink>,
    shutdown: ShutdownSignal,
    run_id: String,
}

impl<F> MigrationEngine<F>
where
    F: ClientFactory,
{
    pub fn new(config: EngineConfig, factory: F) -> Result<Self> {
        // Rejects zero workers or a zero minimum before anything runs
        PartitionPlan::compute(0, config.max_workers, config.min_items_per_worker)?;

        let run_id = Uuid::new_v4().simple().to_string()[..8].to_string();

        Ok(Self {
            config,
            factory,
            progress: Box::new(NoProgress),
            shutdown: ShutdownSignal::new(),
            run_id,
        })
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Draw per-worker bars counting `unit`, if `show_progress` is enabled
    pub fn with_terminal_progress(self, unit: &str) -> Self {
        if self.config.show_progress {
            self.with_progress(Box::new(TerminalProgress::new(unit)))
        } else {
            self
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn plan(&self, total_items: usize) -> Result<PartitionPlan> {
        PartitionPlan::compute(
            total_items,
            self.config.max_workers,
            self.config.min_items_per_worker,
        )
    }

    /// Process `items` in parallel, merge the worker output into
    /// `job.output_path` and report what happened.
    ///
    /// Item failures and fatal workers are reported, not returned. The only
    /// errors are invalid input and a failed merge, in which case every
    /// worker sink is left on disk and listed in the error.
    pub fn run<T, P, S, K>(&self, job: &BatchJob<S>, items: &[T], processor: &P) -> Result<FinalReport>
    where
        T: Sync,
        P: ItemProcessor<T, F::Client> + ?Sized,
        S: Fn(&Record) -> K,
        K: Ord,
    {
        let started = Instant::now();
        let plan = self.plan(items.len())?;
        info!(
            "Running {} on {} items with {} workers (run {})",
            job.name,
            items.len(),
            plan.worker_count(),
            self.run_id
        );

        let sinks = SinkFactory::new(&self.config.spool, format!("{}-{}", job.name, self.run_id));
        let pool = WorkerPool::new(
            &job.name,
            &self.factory,
            &sinks,
            self.progress.as_ref(),
            &self.shutdown,
        );
        let mut summaries = pool.run(&plan, items, processor)?;

        let merger = ResultMerger::new(job.header.clone(), job.output_path.clone());
        let rows_written = match merger.merge(&summaries, &job.sort_key) {
            Ok(rows) => {
                merger.cleanup(&mut summaries);
                metrics::record_merged_rows(&job.name, rows);
                rows
            }
            Err(e) => {
                error!("Merge into {} failed: {}", job.output_path.display(), e);
                let preserved = self.preserve_sinks(&sinks, &mut summaries);
                return Err(MigrationError::Merge {
                    output: job.output_path.clone(),
                    reason: e.to_string(),
                    preserved,
                });
            }
        };

        let mut report = FinalReport::summarize(
            job.name.clone(),
            items.len(),
            summaries,
            job.output_path.clone(),
            rows_written,
            started.elapsed(),
        );
        report.cancelled = self.shutdown.is_triggered();
        debug_assert_eq!(
            report.total_successful + report.total_failed,
            report.total_processed
        );

        info!(
            "{} finished: {}/{} successful, {} failed, {} unprocessed, {} rows in {:.1}s",
            job.name,
            report.total_successful,
            report.total_items,
            report.total_failed,
            report.total_unprocessed,
            report.rows_written,
            report.elapsed.as_secs_f64()
        );
        if report.cancelled {
            warn!("{} was interrupted; output holds partial results", job.name);
        }

        Ok(report)
    }

    fn preserve_sinks(&self, sinks: &SinkFactory, summaries: &mut [WorkerSummary]) -> Vec<PathBuf> {
        let dir = sinks.spool_dir();
        let mut preserved = Vec::new();
        for summary in summaries.iter_mut() {
            let Some(sink) = summary.sink.take() else {
                continue;
            };
            let hint = format!("{}-w{}", self.run_id, summary.worker_id);
            match sink.preserve(&dir, &hint) {
                Ok(path) => {
                    warn!(
                        "Preserved output of {} at {}",
                        summary.display_name,
                        path.display()
                    );
                    preserved.push(path);
                }
                Err(e) => error!(
                    "Could not preserve output of {}: {}",
                    summary.display_name, e
                ),
            }
        }
        preserved
    }
}
