use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output directory configuration.
///
/// When `directory` is unset a timestamped directory is created under the
/// current working directory for each invocation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}
