use crate::error::{MigrationError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    #[serde(default = "default_log_output")]
    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            output: default_log_output(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
    Pretty,
}

/// Progress bars draw on stderr, so logs default to stdout
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum LogOutput {
    #[serde(rename = "stdout")]
    Stdout,

    #[serde(rename = "stderr")]
    Stderr,

    #[serde(rename = "file")]
    File {
        path: PathBuf,
        #[serde(default)]
        rotation: LogRotation,
    },
}

/// When a file log starts a new file. Rotated files get a date suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    #[default]
    Never,
    Daily,
    Hourly,
}

impl LogRotation {
    /// Appender writing to `path`, creating its directory first
    pub fn appender(self, path: &Path) -> Result<RollingFileAppender> {
        let file_name = path.file_name().ok_or_else(|| {
            MigrationError::Config(format!("Log path {} has no file name", path.display()))
        })?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let rotation = match self {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
        };
        RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(file_name.to_string_lossy().into_owned())
            .build(dir)
            .map_err(|e| MigrationError::Config(format!("Failed to open log file: {}", e)))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_log_output() -> LogOutput {
    LogOutput::Stdout
}
