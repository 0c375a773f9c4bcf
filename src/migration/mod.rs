//! Catalog migration jobs built on the batch engine

pub mod output;
pub mod profiles;
pub mod records;
pub mod tags;

pub use output::{OutputLayout, ASSET_IMPORT_CATEGORY};
pub use profiles::{profile_export_job, ProfileExporter};
pub use records::{parse_tags, read_asset_mappings, read_asset_mappings_from, AssetMapping};
pub use tags::{tag_import_job, TagImporter};

use crate::client::{ApiClient, AuthContext};
use crate::error::{MigrationError, Result};
use serde_json::Value;

/// Look up an asset by uid and return its numeric or string id
pub fn resolve_asset_id<C: ApiClient + ?Sized>(
    client: &C,
    uid: &str,
    auth: AuthContext,
) -> Result<String> {
    let response = client.get(&format!("/catalog-server/api/assets?uid={}", uid), auth)?;
    asset_id_from_response(&response)
        .ok_or_else(|| MigrationError::InvalidResponse(format!("no asset found for uid {}", uid)))
}

/// Extract `data[0].id`, where `data` is either the asset list itself or an
/// object holding it under `assets`
pub fn asset_id_from_response(response: &Value) -> Option<String> {
    let assets = match response.get("data")? {
        Value::Array(assets) => assets,
        Value::Object(data) => data.get("assets")?.as_array()?,
        _ => return None,
    };

    match assets.first()?.get("id")? {
        Value::Number(id) => Some(id.to_string()),
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        _ => None,
    }
}
