use crate::unit::common::file_count;
use catalog_migrate::config::{SpoolConfig, SpoolStrategy};
use catalog_migrate::engine::{SinkFactory, SinkHandle, SpoolFile, WorkerSink};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn spool_config(strategy: SpoolStrategy, dir: &TempDir) -> SpoolConfig {
    SpoolConfig {
        strategy,
        memory_threshold: 3,
        directory: Some(dir.path().to_path_buf()),
    }
}

fn record(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_auto_strategy_uses_threshold() {
    let dir = TempDir::new().unwrap();
    let factory = SinkFactory::new(&spool_config(SpoolStrategy::Auto, &dir), "run");

    assert!(factory.uses_memory(3));
    assert!(!factory.uses_memory(4));
    assert!(matches!(factory.create(0, 2).unwrap(), WorkerSink::Memory(_)));
    assert!(matches!(factory.create(1, 10).unwrap(), WorkerSink::File(_)));
}

#[test]
fn test_forced_strategies() {
    let dir = TempDir::new().unwrap();
    let memory = SinkFactory::new(&spool_config(SpoolStrategy::Memory, &dir), "run");
    let file = SinkFactory::new(&spool_config(SpoolStrategy::File, &dir), "run");

    assert!(memory.uses_memory(1_000_000));
    assert!(!file.uses_memory(1));
}

#[test]
fn test_file_sink_round_trips_awkward_fields() {
    let dir = TempDir::new().unwrap();
    let factory = SinkFactory::new(&spool_config(SpoolStrategy::File, &dir), "run");
    let mut sink = factory.create(0, 10).unwrap();

    let rows = vec![
        record(&["a.b.c", r#"{"key": "value, with comma"}"#, "src"]),
        record(&["line\nbreak", "\"quoted\"", ""]),
    ];
    for row in &rows {
        sink.append(row).unwrap();
    }
    assert_eq!(sink.len(), 2);

    let handle = sink.finish().unwrap();
    let path = handle.path().unwrap().to_path_buf();
    assert!(path.starts_with(dir.path()));
    assert_eq!(handle.read_records().unwrap(), rows);

    handle.discard().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_dropped_file_sink_removes_spool() {
    let dir = TempDir::new().unwrap();
    let factory = SinkFactory::new(&spool_config(SpoolStrategy::File, &dir), "run");
    let mut sink = factory.create(0, 10).unwrap();
    sink.append(&record(&["x"])).unwrap();

    let handle = sink.finish().unwrap();
    assert_eq!(file_count(dir.path()), 1);

    drop(handle);
    assert_eq!(file_count(dir.path()), 0);
}

#[test]
fn test_preserve_keeps_file_sink() {
    let dir = TempDir::new().unwrap();
    let factory = SinkFactory::new(&spool_config(SpoolStrategy::File, &dir), "run");
    let mut sink = factory.create(0, 10).unwrap();
    sink.append(&record(&["kept"])).unwrap();

    let handle = sink.finish().unwrap();
    let original = handle.path().unwrap().to_path_buf();
    let preserved = handle.preserve(dir.path(), "hint").unwrap();

    assert_eq!(preserved, original);
    assert!(preserved.exists());
}

#[test]
fn test_preserve_spills_memory_sink() {
    let dir = TempDir::new().unwrap();
    let handle = SinkHandle::Memory(vec![record(&["b", "2"]), record(&["a", "1"])]);

    let path = handle.preserve(dir.path(), "run-w0").unwrap();
    assert!(path.exists());
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("run-w0-"));

    let reread = SinkHandle::from_preserved(&path);
    assert_eq!(
        reread.read_records().unwrap(),
        vec![record(&["b", "2"]), record(&["a", "1"])]
    );

    // Adopted files survive drop
    drop(reread);
    assert!(path.exists());
}

#[test]
fn test_spool_file_adopt_and_remove() {
    let dir = TempDir::new().unwrap();
    let path: PathBuf = dir.path().join("spool.csv");
    fs::write(&path, "\"a\"\n").unwrap();

    let spool = SpoolFile::adopt(&path);
    assert_eq!(spool.path(), path.as_path());
    spool.remove().unwrap();
    assert!(!path.exists());

    // Removing a missing file is not an error
    SpoolFile::adopt(&path).remove().unwrap();
}
