use crate::unit::common::{engine_config, read_rows, FakeApi, FakeFactory};
use catalog_migrate::client::{AuthContext, HttpMethod};
use catalog_migrate::config::SpoolStrategy;
use catalog_migrate::engine::MigrationEngine;
use catalog_migrate::migration::{tag_import_job, AssetMapping, TagImporter};
use serde_json::json;
use tempfile::TempDir;

fn mapping(target_uid: &str, tags: &[&str]) -> AssetMapping {
    AssetMapping {
        source_id: "1".to_string(),
        source_uid: format!("src.{}", target_uid),
        target_id: "2".to_string(),
        target_uid: target_uid.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

fn register_target(api: &FakeApi, uid: &str, id: u64) {
    api.respond(
        HttpMethod::Get,
        &format!("/catalog-server/api/assets?uid={}", uid),
        json!({"data": [{"id": id}]}),
    );
    api.respond(
        HttpMethod::Post,
        &format!("/catalog-server/api/assets/{}/tag", id),
        json!({"status": "ok"}),
    );
}

fn engine(api: &FakeApi, dir: &TempDir) -> MigrationEngine<FakeFactory> {
    MigrationEngine::new(
        engine_config(5, 10, SpoolStrategy::Auto, dir.path()),
        FakeFactory::new(api.clone()),
    )
    .unwrap()
}

#[test]
fn test_select_keeps_only_tagged_mappings() {
    let selected = TagImporter::select(vec![
        mapping("a", &["x"]),
        mapping("b", &[]),
        mapping("c", &["y", "z"]),
    ]);

    let uids: Vec<&str> = selected.iter().map(|m| m.target_uid.as_str()).collect();
    assert_eq!(uids, vec!["a", "c"]);
}

#[test]
fn test_imports_every_tag_with_target_auth() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("asset-tag-import-results.csv");
    let api = FakeApi::new();
    register_target(&api, "tgt.orders", 5);

    let report = engine(&api, &dir)
        .run(
            &tag_import_job(&output),
            &[mapping("tgt.orders", &["pii", "finance"])],
            &TagImporter::new(false),
        )
        .unwrap();

    assert!(report.is_clean());
    let posts = api.calls_with(HttpMethod::Post);
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].endpoint, "/catalog-server/api/assets/5/tag");
    assert_eq!(posts[0].payload, Some(json!({"name": "pii"})));
    assert_eq!(posts[1].payload, Some(json!({"name": "finance"})));
    assert!(api.calls().iter().all(|c| c.auth == AuthContext::Target));

    let rows = read_rows(&output);
    assert_eq!(rows, vec![vec!["tgt.orders", "5", "pii:finance"]]);
}

#[test]
fn test_failed_tag_fails_the_item() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let api = FakeApi::new();
    api.respond(
        HttpMethod::Get,
        "/catalog-server/api/assets?uid=tgt.users",
        json!({"data": [{"id": 9}]}),
    );
    api.fail(HttpMethod::Post, "/catalog-server/api/assets/9/tag", 409);

    let report = engine(&api, &dir)
        .run(
            &tag_import_job(&output),
            &[mapping("tgt.users", &["gold", "silver"])],
            &TagImporter::new(false),
        )
        .unwrap();

    assert_eq!(report.total_failed, 1);
    let error = &report.failures()[0].error;
    assert!(error.contains("2 tag(s)"));
    assert!(error.contains("gold, silver"));
    assert!(read_rows(&output).is_empty());
}

#[test]
fn test_dry_run_sends_no_writes() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let api = FakeApi::new();
    register_target(&api, "tgt.events", 3);

    let importer = TagImporter::new(true);
    assert!(importer.is_dry_run());
    let report = engine(&api, &dir)
        .run(
            &tag_import_job(&output),
            &[mapping("tgt.events", &["a", "b"])],
            &importer,
        )
        .unwrap();

    assert_eq!(report.total_successful, 1);
    assert!(api.calls_with(HttpMethod::Post).is_empty());
    let rows = read_rows(&output);
    assert_eq!(rows[0][1], "3");
    assert!(rows[0][2].starts_with("planned:"));
    assert!(rows[0][2].ends_with("a:b"));
}

#[test]
fn test_unknown_target_asset_fails() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let api = FakeApi::new();

    let report = engine(&api, &dir)
        .run(
            &tag_import_job(&output),
            &[mapping("tgt.missing", &["x"])],
            &TagImporter::new(false),
        )
        .unwrap();

    assert_eq!(report.total_failed, 1);
    assert!(report.failures()[0].error.contains("404"));
}
