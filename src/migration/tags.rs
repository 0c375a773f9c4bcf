use super::records::AssetMapping;
use super::resolve_asset_id;
use crate::client::{ApiClient, AuthContext};
use crate::engine::sort_keys::{self, ColumnKey};
use crate::engine::{BatchJob, ItemContext, ItemProcessor, Record};
use crate::error::{MigrationError, Result};
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const TAG_JOB: &str = "tags";

pub const TAG_HEADER: [&str; 3] = ["target_uid", "target_id", "tags"];

pub const TAG_OUTPUT_FILE: &str = "asset-tag-import-results.csv";

const DRY_RUN_MARKER: &str = "planned:";

/// Attaches each mapping's tags to the matching target asset
#[derive(Debug, Default, Clone, Copy)]
pub struct TagImporter {
    dry_run: bool,
}

impl TagImporter {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Mappings that carry at least one tag
    pub fn select(mappings: Vec<AssetMapping>) -> Vec<AssetMapping> {
        mappings.into_iter().filter(AssetMapping::has_tags).collect()
    }
}

impl<C: ApiClient> ItemProcessor<AssetMapping, C> for TagImporter {
    fn process(&self, item: &AssetMapping, ctx: &ItemContext<'_, C>) -> Result<Option<Record>> {
        let asset_id = resolve_asset_id(ctx.client, &item.target_uid, AuthContext::Target)?;
        let joined = item.tags.join(":");

        if self.dry_run {
            debug!(
                "Dry run: would tag {} (asset {}) with {}",
                item.target_uid, asset_id, joined
            );
            return Ok(Some(vec![
                item.target_uid.clone(),
                asset_id,
                format!("{} {}", DRY_RUN_MARKER, joined),
            ]));
        }

        let endpoint = format!("/catalog-server/api/assets/{}/tag", asset_id);
        let mut failed = Vec::new();
        for tag in &item.tags {
            match ctx
                .client
                .post(&endpoint, json!({ "name": tag }), AuthContext::Target)
            {
                Ok(response) if !response.is_null() => {
                    debug!("Tagged {} with {}", item.target_uid, tag);
                }
                Ok(_) => {
                    warn!("Empty response tagging {} with {}", item.target_uid, tag);
                    failed.push(tag.clone());
                }
                Err(e) => {
                    warn!("Failed to tag {} with {}: {}", item.target_uid, tag, e);
                    failed.push(tag.clone());
                }
            }
        }

        if !failed.is_empty() {
            return Err(MigrationError::TagImport {
                asset: item.target_uid.clone(),
                failed,
            });
        }

        Ok(Some(vec![item.target_uid.clone(), asset_id, joined]))
    }
}

/// Batch description for a tag import writing its results to `output_path`
pub fn tag_import_job(
    output_path: impl Into<PathBuf>,
) -> BatchJob<impl Fn(&Record) -> ColumnKey + Clone + Send + Sync> {
    BatchJob::new(
        TAG_JOB,
        TAG_HEADER,
        output_path,
        sort_keys::column_case_insensitive(0),
    )
}
