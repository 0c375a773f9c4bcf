use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {method} {endpoint} returned {status}: {body}")]
    Api {
        method: String,
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Failed to import {} tag(s) for {asset}: {}", .failed.len(), .failed.join(", "))]
    TagImport { asset: String, failed: Vec<String> },

    #[error("Worker error: {0}")]
    Worker(String),

    #[error(
        "Failed to write merged output {}: {reason} ({} worker sink(s) preserved)",
        output.display(),
        preserved.len()
    )]
    Merge {
        output: PathBuf,
        reason: String,
        preserved: Vec<PathBuf>,
    },

    #[error("Run cancelled: {0}")]
    Cancelled(String),
}

impl MigrationError {
    /// Sink files left on disk by a failed merge, if any
    pub fn preserved_sinks(&self) -> &[PathBuf] {
        match self {
            MigrationError::Merge { preserved, .. } => preserved,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
