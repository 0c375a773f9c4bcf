use crate::error::Result;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

const MAPPING_COLUMNS: usize = 5;

/// One row of the source-to-target asset mapping file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMapping {
    pub source_id: String,
    pub source_uid: String,
    pub target_id: String,
    pub target_uid: String,
    pub tags: Vec<String>,
}

impl AssetMapping {
    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }
}

/// Split a colon-separated tag list, dropping blank entries
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(':')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn read_asset_mappings(path: &Path) -> Result<Vec<AssetMapping>> {
    debug!("Reading asset mappings from {}", path.display());
    read_asset_mappings_from(File::open(path)?)
}

/// Read mapping rows, skipping the header and any row that is too short or
/// lacks a source id or target uid
pub fn read_asset_mappings_from<R: Read>(reader: R) -> Result<Vec<AssetMapping>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut mappings = Vec::new();
    for (row_number, row) in reader.records().enumerate() {
        let row = row?;
        // Header is line 1
        let line = row_number + 2;

        if row.len() < MAPPING_COLUMNS {
            warn!(
                "Skipping line {}: expected {} columns, found {}",
                line,
                MAPPING_COLUMNS,
                row.len()
            );
            continue;
        }

        let source_id = &row[0];
        let target_uid = &row[3];
        if source_id.is_empty() || target_uid.is_empty() {
            warn!("Skipping line {}: missing source_id or target_uid", line);
            continue;
        }

        mappings.push(AssetMapping {
            source_id: source_id.to_string(),
            source_uid: row[1].to_string(),
            target_id: row[2].to_string(),
            target_uid: target_uid.to_string(),
            tags: parse_tags(&row[4]),
        });
    }

    debug!("Read {} asset mappings", mappings.len());
    Ok(mappings)
}
