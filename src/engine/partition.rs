use crate::error::{MigrationError, Result};
use std::ops::Range;

/// Assignment of contiguous, non-overlapping index ranges to workers.
///
/// The ranges always cover `0..total_items` exactly once, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    total_items: usize,
    ranges: Vec<Range<usize>>,
}

impl PartitionPlan {
    /// Split `total_items` across at most `max_workers` workers, giving each
    /// worker at least `min_items_per_worker` items where possible.
    ///
    /// Batches smaller than `min_items_per_worker` run on one worker and an
    /// empty batch yields an empty plan. Ranges are `ceil(total / workers)`
    /// long, with the last one ending at `total_items`.
    pub fn compute(
        total_items: usize,
        max_workers: usize,
        min_items_per_worker: usize,
    ) -> Result<Self> {
        if max_workers == 0 {
            return Err(MigrationError::Config(
                "max_workers must be greater than zero".to_string(),
            ));
        }
        if min_items_per_worker == 0 {
            return Err(MigrationError::Config(
                "min_items_per_worker must be greater than zero".to_string(),
            ));
        }

        if total_items == 0 {
            return Ok(Self {
                total_items,
                ranges: Vec::new(),
            });
        }

        if total_items < min_items_per_worker {
            return Ok(Self {
                total_items,
                ranges: vec![0..total_items],
            });
        }

        let worker_count = max_workers.min(total_items.div_ceil(min_items_per_worker));
        let chunk_size = total_items.div_ceil(worker_count);

        let mut ranges = Vec::with_capacity(worker_count);
        let mut start = 0;
        while start < total_items {
            let end = (start + chunk_size).min(total_items);
            ranges.push(start..end);
            start = end;
        }

        Ok(Self {
            total_items,
            ranges,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    /// Items per worker for the widest range
    pub fn chunk_size(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
