// Configuration loader tests

use catalog_migrate::config::{ConfigLoader, LogFormat, LogOutput, SpoolStrategy};
use std::fs;
use tempfile::TempDir;

fn create_test_yaml_content() -> String {
    r#"
app:
  name: migration-test

api:
  host: https://${tenant}.example.app
  source:
    access_key: src-access
    secret_key: src-secret
    tenant: acme-src
  target:
    access_key: tgt-access
    secret_key: tgt-secret
    tenant: acme-tgt

engine:
  max_workers: 8
  min_items_per_worker: 25
  spool:
    strategy: file
    directory: /tmp/catalog-spool

logging:
  level: debug
  format: json
  output:
    type: file
    path: ./logs/run.log
"#
    .to_string()
}

const MINIMAL_YAML: &str = r#"
api:
  host: https://catalog.example.app
  source:
    access_key: key
    secret_key: secret
    tenant: acme
"#;

#[test]
fn test_yaml_file_loading() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, create_test_yaml_content()).unwrap();

    let config = ConfigLoader::load_layered(Some(&config_path), "CMTEST_FILE").unwrap();

    assert_eq!(config.app.name, "migration-test");
    assert_eq!(config.api.source.tenant, "acme-src");
    assert_eq!(config.api.target.as_ref().unwrap().tenant, "acme-tgt");
    assert_eq!(config.engine.max_workers, 8);
    assert_eq!(config.engine.min_items_per_worker, 25);
    assert_eq!(config.engine.spool.strategy, SpoolStrategy::File);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert!(matches!(config.logging.output, LogOutput::File { .. }));
}

#[test]
fn test_minimal_yaml_uses_defaults() {
    let config = ConfigLoader::load_from_str(MINIMAL_YAML).unwrap();

    assert!(config.api.target.is_none());
    assert_eq!(config.api.timeout, 10);
    assert_eq!(config.engine.max_workers, 5);
    assert_eq!(config.engine.min_items_per_worker, 10);
    assert!(config.engine.show_progress);
    assert_eq!(config.engine.spool.strategy, SpoolStrategy::Auto);
    assert_eq!(config.engine.spool.memory_threshold, 5000);
    assert!(config.output.directory.is_none());
    assert_eq!(config.logging.level, "info");
    assert!(matches!(config.logging.output, LogOutput::Stdout));
    assert!(config.monitoring.metrics_enabled);
}

#[test]
fn test_file_not_found_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.yaml");

    let result = ConfigLoader::load_layered(Some(&missing), "CMTEST_MISSING");
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[test]
fn test_unknown_section_is_rejected() {
    let yaml = format!("{}\nsearch_index:\n  url: http://localhost:7700\n", MINIMAL_YAML);
    assert!(ConfigLoader::load_from_str(&yaml).is_err());
}

#[test]
fn test_environment_overrides() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, MINIMAL_YAML).unwrap();

    std::env::set_var("CMTEST_ENV__ENGINE__MAX_WORKERS", "12");
    std::env::set_var("CMTEST_ENV__API__SOURCE__TENANT", "override-tenant");

    let config = ConfigLoader::load_layered(Some(&config_path), "CMTEST_ENV").unwrap();

    std::env::remove_var("CMTEST_ENV__ENGINE__MAX_WORKERS");
    std::env::remove_var("CMTEST_ENV__API__SOURCE__TENANT");

    assert_eq!(config.engine.max_workers, 12);
    assert_eq!(config.api.source.tenant, "override-tenant");
}

#[test]
fn test_sample_config_is_loadable() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    let sample = ConfigLoader::generate_sample();
    fs::write(&config_path, sample).unwrap();

    // Only ${tenant} is a placeholder; credentials come from the environment
    assert_eq!(sample.matches("${").count(), sample.matches("${tenant}").count());

    // Without keys in the environment the sample does not validate
    let err = ConfigLoader::load_layered(Some(&config_path), "CMTEST_NOKEYS").unwrap_err();
    assert!(err.to_string().contains("api.source.access_key cannot be empty"));

    let keys = [
        ("CMTEST_SAMPLE__API__SOURCE__ACCESS_KEY", "src-access"),
        ("CMTEST_SAMPLE__API__SOURCE__SECRET_KEY", "src-secret"),
        ("CMTEST_SAMPLE__API__TARGET__ACCESS_KEY", "tgt-access"),
        ("CMTEST_SAMPLE__API__TARGET__SECRET_KEY", "tgt-secret"),
    ];
    for (name, value) in keys {
        std::env::set_var(name, value);
    }
    let config = ConfigLoader::load_layered(Some(&config_path), "CMTEST_SAMPLE");
    for (name, _) in keys {
        std::env::remove_var(name);
    }

    let config = config.unwrap();
    assert_eq!(config.app.name, "catalog-migrate");
    assert_eq!(config.api.source.access_key, "src-access");
    assert_eq!(config.api.target.unwrap().secret_key, "tgt-secret");
}

#[test]
fn test_redacted_config_hides_secrets() {
    let config = ConfigLoader::load_from_str(&create_test_yaml_content()).unwrap();
    let yaml = serde_yaml::to_string(&config.redacted()).unwrap();

    assert!(!yaml.contains("src-secret"));
    assert!(!yaml.contains("tgt-access"));
    assert!(yaml.contains("acme-src"));
}
