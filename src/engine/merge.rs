use super::report::WorkerSummary;
use super::sink::{Record, SinkHandle};
use crate::error::Result;
use csv::{QuoteStyle, WriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Combines worker sinks into the final CSV artifact
#[derive(Debug, Clone)]
pub struct ResultMerger {
    header: Vec<String>,
    output_path: PathBuf,
}

impl ResultMerger {
    pub fn new<H, S>(header: H, output_path: impl Into<PathBuf>) -> Self
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Merge the sinks of `summaries` into the output file and return the
    /// number of data rows written. Sinks are left untouched.
    pub fn merge<K, F>(&self, summaries: &[WorkerSummary], sort_key: F) -> Result<usize>
    where
        K: Ord,
        F: Fn(&Record) -> K,
    {
        let mut ordered: Vec<&WorkerSummary> = summaries.iter().collect();
        ordered.sort_by_key(|s| s.worker_id);

        let handles: Vec<&SinkHandle> = ordered.iter().filter_map(|s| s.sink.as_ref()).collect();
        debug!(
            "Merging {} sinks into {}",
            handles.len(),
            self.output_path.display()
        );
        self.merge_handles(&handles, sort_key)
    }

    /// Merge spool files preserved by a failed run, in the order given
    pub fn remerge<K, F>(&self, paths: &[PathBuf], sort_key: F) -> Result<usize>
    where
        K: Ord,
        F: Fn(&Record) -> K,
    {
        let handles: Vec<SinkHandle> = paths.iter().map(SinkHandle::from_preserved).collect();
        let refs: Vec<&SinkHandle> = handles.iter().collect();
        info!(
            "Re-merging {} preserved spool files into {}",
            refs.len(),
            self.output_path.display()
        );
        self.merge_handles(&refs, sort_key)
    }

    fn merge_handles<K, F>(&self, handles: &[&SinkHandle], sort_key: F) -> Result<usize>
    where
        K: Ord,
        F: Fn(&Record) -> K,
    {
        let mut rows: Vec<Record> = Vec::new();
        for handle in handles {
            rows.extend(handle.read_records()?);
        }

        // Rows are already in origin order; the sort must keep ties that way.
        rows.sort_by_cached_key(|row| sort_key(row));

        self.write(&rows)?;
        Ok(rows.len())
    }

    fn write(&self, rows: &[Record]) -> Result<()> {
        let parent = match self.output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut staged = NamedTempFile::new_in(&parent)?;
        {
            let mut writer = WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .quote_style(QuoteStyle::Always)
                .from_writer(staged.as_file_mut());

            if !self.header.is_empty() {
                writer.write_record(&self.header)?;
            }
            for row in rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        staged.as_file().sync_all()?;
        staged.persist(&self.output_path).map_err(|e| e.error)?;

        info!(
            "Wrote {} rows to {}",
            rows.len(),
            self.output_path.display()
        );
        Ok(())
    }

    /// Delete every sink still attached to `summaries`
    pub fn cleanup(&self, summaries: &mut [WorkerSummary]) {
        for summary in summaries.iter_mut() {
            if let Some(sink) = summary.sink.take() {
                if let Err(e) = sink.discard() {
                    warn!(
                        "Failed to remove sink of {}: {}",
                        summary.display_name, e
                    );
                }
            }
        }
    }
}

/// Ready-made sort keys for [`ResultMerger::merge`]
pub mod sort_keys {
    use super::Record;

    /// Key produced by the column helpers. Numbers order before text.
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
    pub enum ColumnKey {
        Number(i64),
        Text(String),
    }

    /// Column `idx`, compared without regard to case. Missing columns sort first.
    pub fn column_case_insensitive(idx: usize) -> impl Fn(&Record) -> ColumnKey + Clone + Send + Sync {
        move |record: &Record| {
            ColumnKey::Text(
                record
                    .get(idx)
                    .map(|value| value.to_lowercase())
                    .unwrap_or_default(),
            )
        }
    }

    /// Column `idx` as an integer when it parses as one, otherwise as text
    pub fn numeric_column(idx: usize) -> impl Fn(&Record) -> ColumnKey + Clone + Send + Sync {
        move |record: &Record| {
            let value = record.get(idx).map(String::as_str).unwrap_or_default();
            match value.trim().parse::<i64>() {
                Ok(number) => ColumnKey::Number(number),
                Err(_) => ColumnKey::Text(value.to_string()),
            }
        }
    }
}
