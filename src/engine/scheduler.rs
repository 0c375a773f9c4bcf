use super::context::WorkerContext;
use super::partition::PartitionPlan;
use super::processor::{invoke, panic_message, ItemOutcome, ItemProcessor};
use super::progress::{worker_display_name, ProgressReporter, ProgressSink};
use super::report::WorkerSummary;
use super::shutdown::ShutdownSignal;
use super::sink::SinkFactory;
use crate::client::ClientFactory;
use crate::error::{MigrationError, Result};
use crate::metrics;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs one OS thread per partition range and collects their summaries
pub struct WorkerPool<'a, F> {
    job: &'a str,
    factory: &'a F,
    sinks: &'a SinkFactory,
    progress: &'a dyn ProgressSink,
    shutdown: &'a ShutdownSignal,
}

impl<'a, F> WorkerPool<'a, F>
where
    F: ClientFactory,
{
    pub fn new(
        job: &'a str,
        factory: &'a F,
        sinks: &'a SinkFactory,
        progress: &'a dyn ProgressSink,
        shutdown: &'a ShutdownSignal,
    ) -> Self {
        Self {
            job,
            factory,
            sinks,
            progress,
            shutdown,
        }
    }

    /// Process every range of `plan` concurrently and wait for all workers.
    ///
    /// Summaries come back ordered by worker id. A worker that could not be
    /// spawned or died outside the per-item guard still yields a summary,
    /// flagged fatal, with its remaining items counted as unprocessed.
    pub fn run<T, P>(
        &self,
        plan: &PartitionPlan,
        items: &[T],
        processor: &P,
    ) -> Result<Vec<WorkerSummary>>
    where
        T: Sync,
        P: ItemProcessor<T, F::Client> + ?Sized,
    {
        if plan.total_items() != items.len() {
            return Err(MigrationError::Validation(format!(
                "partition plan covers {} items but the batch has {}",
                plan.total_items(),
                items.len()
            )));
        }

        if plan.is_empty() {
            debug!("Nothing to process for {}", self.job);
            return Ok(Vec::new());
        }

        info!(
            "Starting {} workers for {} ({} items, up to {} each)",
            plan.worker_count(),
            self.job,
            plan.total_items(),
            plan.chunk_size()
        );

        let summaries = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(plan.worker_count());

            for (worker_id, range) in plan.ranges().iter().cloned().enumerate() {
                let slice = &items[range.clone()];
                let worker_range = range.clone();
                let spawned = thread::Builder::new()
                    .name(format!("worker-{}", worker_id))
                    .spawn_scoped(scope, move || {
                        self.run_worker(worker_id, worker_range, slice, processor)
                    });
                handles.push((worker_id, range, spawned));
            }

            handles
                .into_iter()
                .map(|(worker_id, range, spawned)| {
                    let name = worker_display_name(worker_id).trim_end().to_string();
                    match spawned {
                        Ok(handle) => handle.join().unwrap_or_else(|payload| {
                            let reason = panic_message(payload.as_ref());
                            error!("{} thread died: {}", name, reason);
                            WorkerSummary::fatal(worker_id, name, range, reason)
                        }),
                        Err(e) => {
                            error!("Failed to spawn {}: {}", name, e);
                            metrics::worker_spawn_failed(self.job);
                            WorkerSummary::fatal(
                                worker_id,
                                name,
                                range,
                                format!("could not spawn worker thread: {}", e),
                            )
                        }
                    }
                })
                .collect::<Vec<_>>()
        });

        Ok(summaries)
    }

    fn run_worker<T, P>(
        &self,
        worker_id: usize,
        range: Range<usize>,
        items: &[T],
        processor: &P,
    ) -> WorkerSummary
    where
        P: ItemProcessor<T, F::Client> + ?Sized,
    {
        let started = Instant::now();
        let label = worker_display_name(worker_id);
        let mut summary = WorkerSummary::new(worker_id, label.trim_end(), range.clone());
        let reporter = self
            .progress
            .reporter(range.len() as u64, &label, worker_id);

        metrics::worker_started(self.job);
        debug!(
            "{} starting on items {}..{}",
            summary.display_name, range.start, range.end
        );

        match WorkerContext::new(
            worker_id,
            summary.display_name.clone(),
            self.factory,
            self.sinks,
            items.len(),
        ) {
            Ok(mut context) => {
                // The context lives outside the guard so a crash keeps its sink
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    self.drive(
                        &mut summary,
                        &mut context,
                        range.start,
                        items,
                        processor,
                        reporter.as_ref(),
                    )
                }));
                if let Err(payload) = outcome {
                    let reason = format!("worker panicked: {}", panic_message(payload.as_ref()));
                    error!("{} stopped: {}", summary.display_name, reason);
                    summary.fatal.get_or_insert(reason);
                }
                close_sink(&mut summary, context);
            }
            Err(e) => {
                error!("{} stopped: {}", summary.display_name, e);
                summary.fatal = Some(e.to_string());
            }
        }

        summary.unprocessed = summary.assigned().saturating_sub(summary.processed);
        if panic::catch_unwind(AssertUnwindSafe(|| reporter.close())).is_err() {
            warn!("{} progress reporter panicked on close", summary.display_name);
        }
        summary.elapsed = started.elapsed();
        metrics::worker_finished(self.job, summary.elapsed, summary.is_fatal());

        debug!(
            "{} finished: {} ok, {} failed, {} unprocessed in {:?}",
            summary.display_name,
            summary.successful,
            summary.failed,
            summary.unprocessed,
            summary.elapsed
        );

        summary
    }

    /// The worker loop proper. Per-item errors never leave this function; a
    /// sink write failure stops the loop and marks the worker fatal.
    fn drive<T, P>(
        &self,
        summary: &mut WorkerSummary,
        context: &mut WorkerContext<F::Client>,
        offset: usize,
        items: &[T],
        processor: &P,
        reporter: &dyn ProgressReporter,
    ) where
        P: ItemProcessor<T, F::Client> + ?Sized,
    {
        for (position, item) in items.iter().enumerate() {
            if self.shutdown.is_triggered() {
                info!(
                    "{} stopping early, {} items left",
                    context.display_name(),
                    items.len() - position
                );
                break;
            }

            let index = offset + position;
            let outcome = invoke(processor, item, &context.item_context(index));

            match outcome {
                ItemOutcome::Success { record } => {
                    let appended = match record {
                        Some(record) => context.append(index, &record),
                        None => Ok(()),
                    };
                    match appended {
                        Ok(()) => {
                            summary.record_success();
                            metrics::record_item(self.job, true);
                        }
                        Err(e) => {
                            let reason = format!("failed to write record: {}", e);
                            warn!("{} item {}: {}", context.display_name(), index, reason);
                            summary.record_failure(index, reason.clone());
                            metrics::record_item(self.job, false);
                            summary.fatal = Some(reason);
                            reporter.advance(1);
                            break;
                        }
                    }
                }
                ItemOutcome::Failure { error } => {
                    warn!("{} item {} failed: {}", context.display_name(), index, error);
                    summary.record_failure(index, error);
                    metrics::record_item(self.job, false);
                }
            }

            reporter.advance(1);
        }
    }
}

/// Close the worker's sink and attach it to the summary for merging. When
/// the sink cannot be closed its records are gone, so the items that wrote
/// them are counted as failed instead of successful.
fn close_sink<C>(summary: &mut WorkerSummary, context: WorkerContext<C>) {
    let (sink, written) = context.into_parts();
    match sink.finish() {
        Ok(handle) => summary.sink = Some(handle),
        Err(e) => {
            let reason = format!("worker output lost: {}", e);
            error!("{}: {}", summary.display_name, reason);
            summary.revoke_successes(&written, &reason);
            summary.fatal.get_or_insert(reason);
        }
    }
}
