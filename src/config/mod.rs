use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod api;
mod engine;
mod loader;
mod logging;
mod monitoring;
mod output;

pub use api::*;
pub use engine::*;
pub use loader::*;
pub use logging::*;
pub use monitoring::*;
pub use output::*;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Application metadata
    #[serde(default)]
    pub app: AppConfig,

    /// Source and target environment connection settings
    pub api: ApiConfig,

    /// Parallel batch engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Where staging and result files are written
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Config {
    /// Copy of the configuration with every credential masked, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.api.source.redact();
        if let Some(target) = config.api.target.as_mut() {
            target.redact();
        }
        config
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            tags: HashMap::new(),
        }
    }
}

fn default_name() -> String {
    "catalog-migrate".to_string()
}

fn default_true() -> bool {
    true
}
