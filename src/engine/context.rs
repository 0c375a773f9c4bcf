use super::processor::ItemContext;
use super::sink::{Record, SinkFactory, WorkerSink};
use crate::client::ClientFactory;
use crate::error::{MigrationError, Result};

/// State owned by exactly one worker: its own API client and its own sink
pub struct WorkerContext<C> {
    worker_id: usize,
    display_name: String,
    client: C,
    sink: WorkerSink,
    /// Batch indices whose records are in `sink`
    written: Vec<usize>,
}

impl<C> WorkerContext<C> {
    pub fn new<F>(
        worker_id: usize,
        display_name: impl Into<String>,
        factory: &F,
        sinks: &SinkFactory,
        expected_items: usize,
    ) -> Result<Self>
    where
        F: ClientFactory<Client = C>,
    {
        let client = factory.create().map_err(|e| {
            MigrationError::Worker(format!(
                "worker {} could not create an API client: {}",
                worker_id, e
            ))
        })?;
        let sink = sinks.create(worker_id, expected_items).map_err(|e| {
            MigrationError::Worker(format!(
                "worker {} could not create its output sink: {}",
                worker_id, e
            ))
        })?;

        Ok(Self {
            worker_id,
            display_name: display_name.into(),
            client,
            sink,
            written: Vec::new(),
        })
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn item_context(&self, index: usize) -> ItemContext<'_, C> {
        ItemContext {
            worker_id: self.worker_id,
            worker_name: &self.display_name,
            index,
            client: &self.client,
        }
    }

    /// Append the record produced for batch item `index`
    pub fn append(&mut self, index: usize, record: &Record) -> Result<()> {
        self.sink.append(record)?;
        self.written.push(index);
        Ok(())
    }

    /// Drop the client and hand back the sink for closing, together with the
    /// indices of the items whose records it holds
    pub fn into_parts(self) -> (WorkerSink, Vec<usize>) {
        (self.sink, self.written)
    }
}
