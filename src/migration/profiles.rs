use super::records::AssetMapping;
use super::resolve_asset_id;
use crate::client::{ApiClient, AuthContext};
use crate::engine::sort_keys::{self, ColumnKey};
use crate::engine::{BatchJob, ItemContext, ItemProcessor, Record};
use crate::error::{MigrationError, Result};
use std::path::PathBuf;
use tracing::debug;

pub const PROFILE_JOB: &str = "profiles";

pub const PROFILE_HEADER: [&str; 3] = ["target-env", "profile_json", "source-env"];

pub const PROFILE_OUTPUT_FILE: &str = "asset-profiles-import-ready.csv";

/// Reads each source asset's profile configuration and produces an
/// import-ready row keyed by the target uid
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfileExporter;

impl<C: ApiClient> ItemProcessor<AssetMapping, C> for ProfileExporter {
    fn process(&self, item: &AssetMapping, ctx: &ItemContext<'_, C>) -> Result<Option<Record>> {
        if item.source_uid.is_empty() || item.target_uid.is_empty() {
            return Err(MigrationError::Validation(format!(
                "mapping for source id {} has no source or target uid",
                item.source_id
            )));
        }

        let asset_id = resolve_asset_id(ctx.client, &item.source_uid, AuthContext::Source)?;
        let profile = ctx.client.get(
            &format!("/catalog-server/api/profile/{}/config", asset_id),
            AuthContext::Source,
        )?;
        if profile.is_null() {
            return Err(MigrationError::InvalidResponse(format!(
                "empty profile configuration for asset {}",
                asset_id
            )));
        }

        debug!(
            "{} exported profile of {} (asset {})",
            ctx.worker_name.trim_end(),
            item.source_uid,
            asset_id
        );

        Ok(Some(vec![
            item.target_uid.clone(),
            serde_json::to_string(&profile)?,
            item.source_uid.clone(),
        ]))
    }
}

/// Batch description for a profile export writing to `output_path`
pub fn profile_export_job(
    output_path: impl Into<PathBuf>,
) -> BatchJob<impl Fn(&Record) -> ColumnKey + Clone + Send + Sync> {
    BatchJob::new(
        PROFILE_JOB,
        PROFILE_HEADER,
        output_path,
        sort_keys::column_case_insensitive(0),
    )
}
