use crate::config::OutputConfig;
use crate::error::Result;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Category directory for files consumed by the import side
pub const ASSET_IMPORT_CATEGORY: &str = "asset-import";

const DEFAULT_DIR_PREFIX: &str = "catalog-migrate";

/// Resolves where generated files go for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The configured directory, or `./catalog-migrate-YYYYMMDDHHMM`
    pub fn from_config(config: &OutputConfig) -> Self {
        match &config.directory {
            Some(directory) => Self::new(directory),
            None => Self::new(format!(
                "{}-{}",
                DEFAULT_DIR_PREFIX,
                Local::now().format("%Y%m%d%H%M")
            )),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<category>/<filename>`, creating the category directory
    pub fn path_for(&self, category: &str, filename: &str) -> Result<PathBuf> {
        let dir = self.root.join(category);
        fs::create_dir_all(&dir)?;
        Ok(dir.join(filename))
    }
}
