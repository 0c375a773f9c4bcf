use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parallel batch engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Upper bound on worker threads per batch
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Batches smaller than this run on a single worker
    #[serde(default = "default_min_items_per_worker")]
    pub min_items_per_worker: usize,

    /// Draw one progress bar per worker
    #[serde(default = "super::default_true")]
    pub show_progress: bool,

    /// Worker output spooling
    #[serde(default)]
    pub spool: SpoolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            min_items_per_worker: default_min_items_per_worker(),
            show_progress: true,
            spool: SpoolConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpoolStrategy {
    /// Memory for small partitions, temp files above `memory_threshold`
    #[default]
    Auto,
    /// Always spool worker output to temp files
    File,
    /// Always keep worker output in memory
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpoolConfig {
    #[serde(default)]
    pub strategy: SpoolStrategy,

    /// Largest partition (in items) kept in memory under `Auto`
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: usize,

    /// Directory for temp files; the system temp dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            strategy: SpoolStrategy::Auto,
            memory_threshold: default_memory_threshold(),
            directory: None,
        }
    }
}

fn default_max_workers() -> usize {
    5
}

fn default_min_items_per_worker() -> usize {
    10
}

fn default_memory_threshold() -> usize {
    5000
}
