use crate::config::{SpoolConfig, SpoolStrategy};
use crate::error::{MigrationError, Result};
use csv::{QuoteStyle, ReaderBuilder, Writer, WriterBuilder};
use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One output row produced by an item processor
pub type Record = Vec<String>;

/// A spool file on disk, removed on drop unless kept
#[derive(Debug)]
pub struct SpoolFile {
    path: PathBuf,
    armed: bool,
}

impl SpoolFile {
    fn owned(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Take over an existing file without deleting it on drop
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leave the file on disk and return its path
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    /// Delete the file now
    pub fn remove(mut self) -> Result<()> {
        self.armed = false;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::remove_file(&self.path) {
                debug!("Could not remove spool file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Creates private sinks for workers
#[derive(Debug, Clone)]
pub struct SinkFactory {
    run_id: String,
    strategy: SpoolStrategy,
    memory_threshold: usize,
    directory: Option<PathBuf>,
}

impl SinkFactory {
    pub fn new(config: &SpoolConfig, run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            strategy: config.strategy,
            memory_threshold: config.memory_threshold,
            directory: config.directory.clone(),
        }
    }

    /// Directory spool files are created in
    pub fn spool_dir(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(env::temp_dir)
    }

    pub fn uses_memory(&self, expected_items: usize) -> bool {
        match self.strategy {
            SpoolStrategy::Memory => true,
            SpoolStrategy::File => false,
            SpoolStrategy::Auto => expected_items <= self.memory_threshold,
        }
    }

    pub fn create(&self, worker_id: usize, expected_items: usize) -> Result<WorkerSink> {
        if self.uses_memory(expected_items) {
            return Ok(WorkerSink::Memory(Vec::with_capacity(expected_items)));
        }

        let dir = self.spool_dir();
        fs::create_dir_all(&dir)?;
        let prefix = format!("{}-w{}-", self.run_id, worker_id);
        let (file, temp_path) = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".csv")
            .tempfile_in(&dir)?
            .into_parts();
        let path = temp_path.keep().map_err(|e| MigrationError::Io(e.error))?;
        debug!("Worker {} spooling to {}", worker_id, path.display());

        Ok(WorkerSink::File(FileSink {
            writer: spool_writer(BufWriter::new(file)),
            spool: SpoolFile::owned(path),
            rows: 0,
        }))
    }
}

fn spool_writer<W: std::io::Write>(inner: W) -> Writer<W> {
    WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote_style(QuoteStyle::Always)
        .from_writer(inner)
}

pub struct FileSink {
    writer: Writer<BufWriter<File>>,
    spool: SpoolFile,
    rows: usize,
}

/// Append-only output owned by a single worker
pub enum WorkerSink {
    File(FileSink),
    Memory(Vec<Record>),
}

impl WorkerSink {
    pub fn append(&mut self, record: &Record) -> Result<()> {
        match self {
            WorkerSink::File(sink) => {
                sink.writer.write_record(record)?;
                sink.rows += 1;
            }
            WorkerSink::Memory(records) => records.push(record.clone()),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        match self {
            WorkerSink::File(sink) => sink.rows,
            WorkerSink::Memory(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the sink for writing
    pub fn finish(self) -> Result<SinkHandle> {
        match self {
            WorkerSink::File(mut sink) => {
                sink.writer.flush()?;
                let file = sink
                    .writer
                    .into_inner()
                    .map_err(|e| {
                        MigrationError::Io(io::Error::new(e.error().kind(), e.to_string()))
                    })?
                    .into_inner()
                    .map_err(|e| MigrationError::Io(e.into_error()))?;
                file.sync_all()?;
                Ok(SinkHandle::File(sink.spool))
            }
            WorkerSink::Memory(records) => Ok(SinkHandle::Memory(records)),
        }
    }
}

/// A closed worker sink, ready to be merged
#[derive(Debug)]
pub enum SinkHandle {
    File(SpoolFile),
    Memory(Vec<Record>),
}

impl SinkHandle {
    /// Wrap a spool file preserved by an earlier run
    pub fn from_preserved(path: impl Into<PathBuf>) -> Self {
        SinkHandle::File(SpoolFile::adopt(path))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            SinkHandle::File(spool) => Some(spool.path()),
            SinkHandle::Memory(_) => None,
        }
    }

    pub fn read_records(&self) -> Result<Vec<Record>> {
        match self {
            SinkHandle::File(spool) => {
                let mut reader = ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .from_path(spool.path())?;
                let mut records = Vec::new();
                for row in reader.records() {
                    let row = row?;
                    records.push(row.iter().map(str::to_string).collect());
                }
                Ok(records)
            }
            SinkHandle::Memory(records) => Ok(records.clone()),
        }
    }

    /// Delete the sink's backing storage
    pub fn discard(self) -> Result<()> {
        match self {
            SinkHandle::File(spool) => spool.remove(),
            SinkHandle::Memory(_) => Ok(()),
        }
    }

    /// Leave the sink on disk for a later merge, spilling memory sinks to
    /// `dir` first, and return its path
    pub fn preserve(self, dir: &Path, name_hint: &str) -> Result<PathBuf> {
        match self {
            SinkHandle::File(spool) => Ok(spool.keep()),
            SinkHandle::Memory(records) => {
                fs::create_dir_all(dir)?;
                let (file, temp_path) = tempfile::Builder::new()
                    .prefix(&format!("{}-", name_hint))
                    .suffix(".csv")
                    .tempfile_in(dir)?
                    .into_parts();
                let mut writer = spool_writer(BufWriter::new(file));
                for record in &records {
                    writer.write_record(record)?;
                }
                writer.flush()?;
                drop(writer);
                match temp_path.keep() {
                    Ok(path) => Ok(path),
                    Err(e) => {
                        warn!("Could not keep spilled sink: {}", e.error);
                        Err(MigrationError::Io(e.error))
                    }
                }
            }
        }
    }
}
