use crate::unit::common::{
    engine_config, file_count, read_rows, CrashingProgress, FakeClient, FakeFactory,
    RecordingProgress,
};
use catalog_migrate::config::SpoolStrategy;
use catalog_migrate::engine::{
    sort_keys, BatchJob, ItemContext, MigrationEngine, Record, ResultMerger, ShutdownSignal,
};
use catalog_migrate::error::{MigrationError, Result};
use catalog_migrate::migration::profiles::PROFILE_HEADER;
use catalog_migrate::migration::{profile_export_job, AssetMapping, ProfileExporter};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

type Ctx<'a> = ItemContext<'a, FakeClient>;

fn engine(
    max_workers: usize,
    min_items: usize,
    strategy: SpoolStrategy,
    spool_dir: &Path,
) -> (MigrationEngine<FakeFactory>, RecordingProgress) {
    let progress = RecordingProgress::new();
    let engine = MigrationEngine::new(
        engine_config(max_workers, min_items, strategy, spool_dir),
        FakeFactory::default(),
    )
    .unwrap()
    .with_progress(Box::new(progress.clone()));
    (engine, progress)
}

fn items(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("asset-{:03}", i)).collect()
}

fn echo(item: &String, ctx: &Ctx<'_>) -> Result<Option<Record>> {
    Ok(Some(vec![item.clone(), ctx.index.to_string()]))
}

fn job(output: &Path) -> BatchJob<impl Fn(&Record) -> sort_keys::ColumnKey> {
    BatchJob::new(
        "test",
        ["item", "index"],
        output,
        sort_keys::column_case_insensitive(0),
    )
}

#[test]
fn test_twenty_three_items_on_three_workers() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let (engine, progress) = engine(5, 10, SpoolStrategy::Auto, dir.path());
    let items = items(23);

    let report = engine.run(&job(&output), &items, &echo).unwrap();

    assert_eq!(report.worker_count(), 3);
    let ranges: Vec<_> = report
        .worker_summaries
        .iter()
        .map(|s| s.range.clone())
        .collect();
    assert_eq!(ranges, vec![0..8, 8..16, 16..23]);
    assert_eq!(report.total_successful, 23);
    assert_eq!(report.rows_written, 23);
    assert!(report.is_clean());

    let rows = read_rows(&output);
    let expected: Vec<String> = items.clone();
    assert_eq!(rows.iter().map(|r| r[0].clone()).collect::<Vec<_>>(), expected);

    assert_eq!(progress.slot_count(), 3);
    assert_eq!(progress.slot(2).unwrap().total, 7);
    for slot in 0..3 {
        let slot = progress.slot(slot).unwrap();
        assert_eq!(slot.advanced(), slot.total);
        assert!(slot.is_closed());
    }
}

#[test]
fn test_four_items_on_one_worker() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let (engine, progress) = engine(5, 10, SpoolStrategy::Auto, dir.path());

    let report = engine.run(&job(&output), &items(4), &echo).unwrap();

    assert_eq!(report.worker_count(), 1);
    assert_eq!(report.worker_summaries[0].range, 0..4);
    assert_eq!(report.worker_summaries[0].display_name, "Rocket Worker");
    assert_eq!(report.total_successful, 4);
    let slot = progress.slot(0).unwrap();
    assert_eq!(slot.total, 4);
    assert!(slot.label.starts_with("Rocket Worker"));
}

#[test]
fn test_one_failing_item_is_isolated() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let (engine, progress) = engine(5, 10, SpoolStrategy::Auto, dir.path());

    let failing = |item: &String, ctx: &Ctx<'_>| -> Result<Option<Record>> {
        if ctx.index == 2 {
            return Err(MigrationError::InvalidResponse("no asset found".to_string()));
        }
        echo(item, ctx)
    };
    let report = engine.run(&job(&output), &items(5), &failing).unwrap();

    assert_eq!(report.total_processed, 5);
    assert_eq!(report.total_successful, 4);
    assert_eq!(report.total_failed, 1);
    assert_eq!(report.rows_written, 4);
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 2);
    assert!(failures[0].error.contains("no asset found"));

    // The bar still reaches the full total
    let slot = progress.slot(0).unwrap();
    assert_eq!(slot.total, 5);
    assert_eq!(slot.advanced(), 5);

    let rows = read_rows(&output);
    assert!(rows.iter().all(|r| r[0] != "asset-002"));
}

#[test]
fn test_panicking_item_does_not_stop_worker() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let (engine, _) = engine(2, 5, SpoolStrategy::File, dir.path());

    let panicking = |item: &String, ctx: &Ctx<'_>| -> Result<Option<Record>> {
        if ctx.index % 7 == 3 {
            panic!("bad item {}", ctx.index);
        }
        echo(item, ctx)
    };
    let report = engine.run(&job(&output), &items(20), &panicking).unwrap();

    // Indices 3, 10 and 17 panic
    assert_eq!(report.total_failed, 3);
    assert_eq!(report.total_successful, 17);
    assert_eq!(report.total_unprocessed, 0);
    assert!(report.fatal_workers().next().is_none());
    assert!(report.failures().iter().all(|f| f.error.contains("panicked")));
    assert_eq!(read_rows(&output).len(), 17);
}

#[test]
fn test_output_is_independent_of_completion_order() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");

    // Many duplicate keys so the stable sort is exercised across workers
    let items: Vec<String> = (0..40).map(|i| format!("key-{}", i % 4)).collect();

    let slow_first = |item: &String, ctx: &Ctx<'_>| -> Result<Option<Record>> {
        thread::sleep(Duration::from_millis(((40 - ctx.index) / 4) as u64));
        echo(item, ctx)
    };
    let slow_last = |item: &String, ctx: &Ctx<'_>| -> Result<Option<Record>> {
        thread::sleep(Duration::from_millis((ctx.index / 4) as u64));
        echo(item, ctx)
    };

    let (engine, _) = engine(4, 5, SpoolStrategy::Auto, dir.path());
    engine.run(&job(&first), &items, &slow_first).unwrap();
    engine.run(&job(&second), &items, &slow_last).unwrap();

    let first_bytes = fs::read(&first).unwrap();
    assert_eq!(first_bytes, fs::read(&second).unwrap());

    // Equal keys keep their original batch order
    let rows = read_rows(&first);
    let key_zero: Vec<usize> = rows
        .iter()
        .filter(|r| r[0] == "key-0")
        .map(|r| r[1].parse().unwrap())
        .collect();
    let mut sorted = key_zero.clone();
    sorted.sort();
    assert_eq!(key_zero, sorted);
    assert_eq!(key_zero.len(), 10);
}

#[test]
fn test_every_item_is_processed_exactly_once() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let (engine, _) = engine(5, 3, SpoolStrategy::File, dir.path());
    let items = items(97);

    let report = engine.run(&job(&output), &items, &echo).unwrap();

    let indices: Vec<usize> = read_rows(&output)
        .iter()
        .map(|r| r[1].parse().unwrap())
        .collect();
    let unique: HashSet<usize> = indices.iter().copied().collect();
    assert_eq!(indices.len(), 97);
    assert_eq!(unique.len(), 97);
    assert_eq!(report.total_processed, report.total_items);
    assert_eq!(
        report.total_successful + report.total_failed,
        report.total_processed
    );
}

#[test]
fn test_spool_files_are_removed_after_merge() {
    let dir = TempDir::new().unwrap();
    let spool = dir.path().join("spool");
    fs::create_dir_all(&spool).unwrap();
    let output = dir.path().join("out.csv");
    let (engine, _) = engine(3, 2, SpoolStrategy::File, &spool);

    engine.run(&job(&output), &items(12), &echo).unwrap();

    assert_eq!(file_count(&spool), 0);
    assert_eq!(read_rows(&output).len(), 12);
}

#[test]
fn test_empty_batch_writes_header_only() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let (engine, progress) = engine(5, 10, SpoolStrategy::Auto, dir.path());

    let report = engine.run(&job(&output), &items(0), &echo).unwrap();

    assert_eq!(report.worker_count(), 0);
    assert_eq!(report.total_items, 0);
    assert_eq!(report.rows_written, 0);
    assert_eq!(progress.slot_count(), 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), "\"item\",\"index\"\n");
}

#[test]
fn test_client_creation_failure_is_fatal_for_worker() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let engine = MigrationEngine::new(
        engine_config(2, 5, SpoolStrategy::Auto, dir.path()),
        FakeFactory::refusing(),
    )
    .unwrap();

    let report = engine.run(&job(&output), &items(10), &echo).unwrap();

    assert_eq!(report.worker_count(), 2);
    assert_eq!(report.fatal_workers().count(), 2);
    assert_eq!(report.total_processed, 0);
    assert_eq!(report.total_unprocessed, 10);
    assert!(report.worker_summaries[0]
        .fatal
        .as_deref()
        .unwrap()
        .contains("API client"));
    assert_eq!(report.rows_written, 0);
}

#[test]
fn test_each_worker_gets_its_own_client() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let factory = FakeFactory::default();
    let engine = MigrationEngine::new(
        engine_config(4, 5, SpoolStrategy::Auto, dir.path()),
        factory.clone(),
    )
    .unwrap();

    let report = engine.run(&job(&output), &items(40), &echo).unwrap();

    assert_eq!(report.worker_count(), 4);
    assert_eq!(factory.created(), 4);
}

#[test]
fn test_shutdown_stops_workers_between_items() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let shutdown = ShutdownSignal::new();
    let (engine, _) = engine(1, 100, SpoolStrategy::Auto, dir.path());
    let engine = engine.with_shutdown(shutdown.clone());

    let interrupting = |item: &String, ctx: &Ctx<'_>| -> Result<Option<Record>> {
        if ctx.index == 4 {
            shutdown.trigger();
        }
        echo(item, ctx)
    };
    let report = engine.run(&job(&output), &items(20), &interrupting).unwrap();

    assert!(report.cancelled);
    assert_eq!(report.total_processed, 5);
    assert_eq!(report.total_successful, 5);
    assert_eq!(report.total_unprocessed, 15);
    assert!(!report.is_clean());
    // Partial results are still merged
    assert_eq!(read_rows(&output).len(), 5);
}

#[test]
fn test_merge_failure_preserves_sinks_for_remerge() {
    let dir = TempDir::new().unwrap();
    let spool = dir.path().join("spool");
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "").unwrap();
    let bad_output = blocker.join("out.csv");
    let good_output = dir.path().join("good.csv");
    let remerged = dir.path().join("remerged.csv");
    let items = items(25);

    // Ranges of 9, 9 and 7 items: two file sinks and one memory sink
    let mut config = engine_config(3, 5, SpoolStrategy::Auto, &spool);
    config.spool.memory_threshold = 8;
    let engine = MigrationEngine::new(config.clone(), FakeFactory::default()).unwrap();

    let error = engine.run(&job(&bad_output), &items, &echo).unwrap_err();
    let preserved = match &error {
        MigrationError::Merge { preserved, output, .. } => {
            assert_eq!(output, &bad_output);
            preserved.clone()
        }
        other => panic!("expected merge error, got {:?}", other),
    };
    assert_eq!(preserved.len(), 3);
    assert_eq!(error.preserved_sinks().len(), 3);
    assert!(preserved.iter().all(|p| p.exists()));

    let rows = ResultMerger::new(["item", "index"], &remerged)
        .remerge(&preserved, sort_keys::column_case_insensitive(0))
        .unwrap();
    assert_eq!(rows, 25);

    let engine = MigrationEngine::new(config, FakeFactory::default()).unwrap();
    engine.run(&job(&good_output), &items, &echo).unwrap();
    assert_eq!(
        fs::read(&remerged).unwrap(),
        fs::read(&good_output).unwrap()
    );
}

#[test]
fn test_profile_header_is_written_by_job() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("profiles.csv");
    let (engine, _) = engine(5, 10, SpoolStrategy::Auto, dir.path());
    let job = profile_export_job(&output);
    let mappings: Vec<AssetMapping> = Vec::new();

    engine.run(&job, &mappings, &ProfileExporter).unwrap();

    let header = fs::read_to_string(&output).unwrap();
    let expected: Vec<String> = PROFILE_HEADER.iter().map(|h| format!("\"{}\"", h)).collect();
    assert_eq!(header.trim_end(), expected.join(","));
}

#[test]
fn test_zero_workers_is_rejected() {
    let dir = TempDir::new().unwrap();
    let result = MigrationEngine::new(
        engine_config(0, 10, SpoolStrategy::Auto, dir.path()),
        FakeFactory::default(),
    );
    assert!(matches!(result, Err(MigrationError::Config(_))));
}

fn crashing_engine(
    panic_on: u64,
    strategy: SpoolStrategy,
    spool_dir: &Path,
) -> MigrationEngine<FakeFactory> {
    MigrationEngine::new(
        engine_config(1, 10, strategy, spool_dir),
        FakeFactory::default(),
    )
    .unwrap()
    .with_progress(Box::new(CrashingProgress { panic_on }))
}

fn assert_worker_died_with_rows_merged(strategy: SpoolStrategy) {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let engine = crashing_engine(3, strategy, dir.path());

    let report = engine.run(&job(&output), &items(5), &echo).unwrap();

    let summary = &report.worker_summaries[0];
    assert!(summary
        .fatal
        .as_deref()
        .unwrap()
        .contains("worker panicked: progress bar crashed"));
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.unprocessed, 2);
    assert_eq!(
        summary.successful + summary.failed + summary.unprocessed,
        summary.assigned()
    );

    // Every counted success has its row in the output
    assert_eq!(report.rows_written, 3);
    let rows = read_rows(&output);
    let merged: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(merged, vec!["asset-000", "asset-001", "asset-002"]);
    assert_eq!(file_count(dir.path()), 1);
}

#[test]
fn test_worker_crash_keeps_memory_sink_rows() {
    assert_worker_died_with_rows_merged(SpoolStrategy::Memory);
}

#[test]
fn test_worker_crash_keeps_file_sink_rows() {
    assert_worker_died_with_rows_merged(SpoolStrategy::File);
}

#[test]
fn test_reporter_panic_on_close_keeps_results() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let engine = crashing_engine(0, SpoolStrategy::File, dir.path());

    let report = engine.run(&job(&output), &items(6), &echo).unwrap();

    assert!(report.fatal_workers().next().is_none());
    assert_eq!(report.total_successful, 6);
    assert_eq!(report.rows_written, 6);
    assert_eq!(read_rows(&output).len(), 6);
}

#[test]
fn test_crash_after_item_failures_balances_counters() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let engine = crashing_engine(4, SpoolStrategy::Auto, dir.path());

    let flaky = |item: &String, ctx: &Ctx<'_>| -> Result<Option<Record>> {
        if ctx.index % 2 == 1 {
            return Err(MigrationError::Validation(format!("bad {}", item)));
        }
        echo(item, ctx)
    };
    let report = engine.run(&job(&output), &items(8), &flaky).unwrap();

    assert_eq!(report.total_successful, 2);
    assert_eq!(report.total_failed, 2);
    assert_eq!(report.total_unprocessed, 4);
    assert_eq!(
        report.total_successful + report.total_failed + report.total_unprocessed,
        report.total_items
    );
    assert_eq!(report.rows_written, report.total_successful);
}

#[test]
fn test_terminal_progress_is_skipped_when_disabled() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let engine = MigrationEngine::new(
        engine_config(2, 5, SpoolStrategy::Auto, dir.path()),
        FakeFactory::default(),
    )
    .unwrap()
    .with_terminal_progress("assets");

    assert!(!engine.config().show_progress);
    let report = engine.run(&job(&output), &items(10), &echo).unwrap();
    assert!(report.is_clean());
}
