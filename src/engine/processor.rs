use super::sink::Record;
use crate::error::Result;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// What a processor sees besides the item itself
pub struct ItemContext<'a, C> {
    pub worker_id: usize,
    pub worker_name: &'a str,
    /// Position of the item in the full batch
    pub index: usize,
    pub client: &'a C,
}

/// Result of processing one item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Success { record: Option<Record> },
    Failure { error: String },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success { .. })
    }
}

/// Caller-supplied unit of work.
///
/// Returning `Ok(Some(record))` writes the record to the worker's sink,
/// `Ok(None)` counts a success without output, and `Err` counts a failure.
/// Implemented for any matching closure.
pub trait ItemProcessor<T, C>: Sync {
    fn process(&self, item: &T, ctx: &ItemContext<'_, C>) -> Result<Option<Record>>;
}

impl<T, C, F> ItemProcessor<T, C> for F
where
    F: Fn(&T, &ItemContext<'_, C>) -> Result<Option<Record>> + Sync,
{
    fn process(&self, item: &T, ctx: &ItemContext<'_, C>) -> Result<Option<Record>> {
        self(item, ctx)
    }
}

/// Run the processor for one item, converting errors and panics into
/// `ItemOutcome::Failure` so they never escape the worker loop
pub fn invoke<T, C, P>(processor: &P, item: &T, ctx: &ItemContext<'_, C>) -> ItemOutcome
where
    P: ItemProcessor<T, C> + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| processor.process(item, ctx))) {
        Ok(Ok(record)) => ItemOutcome::Success { record },
        Ok(Err(e)) => ItemOutcome::Failure {
            error: e.to_string(),
        },
        Err(payload) => ItemOutcome::Failure {
            error: format!("processor panicked: {}", panic_message(payload.as_ref())),
        },
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
