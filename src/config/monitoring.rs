use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Enable metrics collection
    #[serde(default = "super::default_true")]
    pub metrics_enabled: bool,

    /// Write the Prometheus text exposition here after each run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_export_path: Option<PathBuf>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_export_path: None,
        }
    }
}
