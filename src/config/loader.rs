use super::{Config, LogOutput, SpoolStrategy, TENANT_PLACEHOLDER};
use crate::error::{MigrationError, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use std::env;
use std::path::Path;
use tracing::debug;

/// Prefix for environment overrides, e.g.
/// `CATALOG_MIGRATE__ENGINE__MAX_WORKERS=8` becomes `engine.max_workers`
pub const ENV_PREFIX: &str = "CATALOG_MIGRATE";

const DEFAULT_CONFIG_FILES: [&str; 4] = [
    "config.yaml",
    "config.yml",
    "catalog-migrate.yaml",
    "catalog-migrate.yml",
];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the default locations plus environment overrides
    pub fn load() -> Result<Config> {
        Self::load_layered(None, ENV_PREFIX)
    }

    /// Load configuration from a specific file plus environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        Self::load_layered(Some(path.as_ref()), ENV_PREFIX)
    }

    /// Load configuration from an in-memory YAML document, without env overrides
    pub fn load_from_str(yaml: &str) -> Result<Config> {
        let builder = ConfigBuilder::builder().add_source(File::from_str(yaml, FileFormat::Yaml));
        Self::finish(builder)
    }

    pub fn load_layered(path: Option<&Path>, env_prefix: &str) -> Result<Config> {
        let mut builder = ConfigBuilder::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(MigrationError::Config(format!(
                        "Configuration file not found: {}",
                        path.display()
                    )));
                }
                builder = builder.add_source(File::from(path));
            }
            None => {
                for file in &DEFAULT_CONFIG_FILES {
                    if Path::new(file).exists() {
                        debug!("Using configuration file {}", file);
                        builder = builder.add_source(File::with_name(file));
                        break;
                    }
                }
            }
        }

        // Environment-specific overlay
        if let Ok(env_name) = env::var("APP_ENV") {
            let env_configs = [
                format!("config.{}.yaml", env_name),
                format!("config.{}.yml", env_name),
            ];

            for file in &env_configs {
                if Path::new(file).exists() {
                    debug!("Applying environment overlay {}", file);
                    builder = builder.add_source(File::with_name(file));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Config> {
        let config = builder
            .build()
            .map_err(|e| MigrationError::Config(format!("Failed to build config: {}", e)))?;

        let config: Config = config.try_deserialize().map_err(|e| {
            MigrationError::Config(format!("Failed to deserialize config: {}", e))
        })?;

        Self::validate(&config)?;

        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        // API configuration
        let host = config.api.host.trim();
        if host.is_empty() {
            errors.push("api.host cannot be empty".to_string());
        } else if !host.starts_with("http://") && !host.starts_with("https://") {
            errors.push(format!("api.host must start with http:// or https://, got '{}'", host));
        }
        for field in config.api.source.missing_fields() {
            errors.push(format!("api.source.{} cannot be empty", field));
        }
        if let Some(target) = &config.api.target {
            for field in target.missing_fields() {
                errors.push(format!("api.target.{} cannot be empty", field));
            }
        }
        if config.api.timeout == 0 {
            errors.push("api.timeout must be > 0".to_string());
        }
        if host.contains(TENANT_PLACEHOLDER) && config.api.source.tenant.trim().is_empty() {
            errors.push("api.host uses ${tenant} but api.source.tenant is empty".to_string());
        }

        // Engine configuration
        if config.engine.max_workers == 0 {
            errors.push("engine.max_workers must be > 0".to_string());
        }
        if config.engine.min_items_per_worker == 0 {
            errors.push("engine.min_items_per_worker must be > 0".to_string());
        }
        if config.engine.spool.strategy == SpoolStrategy::Auto
            && config.engine.spool.memory_threshold == 0
        {
            errors.push(
                "engine.spool.memory_threshold must be > 0 when strategy is auto".to_string(),
            );
        }

        if let LogOutput::File { path, .. } = &config.logging.output {
            if path.as_os_str().is_empty() {
                errors.push("logging.output.path cannot be empty".to_string());
            } else if path.file_name().is_none() {
                errors.push(format!(
                    "logging.output.path must name a file, got '{}'",
                    path.display()
                ));
            }
        }

        if !errors.is_empty() {
            return Err(MigrationError::Validation(errors.join(", ")));
        }

        Ok(())
    }

    /// Create a sample configuration file
    pub fn generate_sample() -> &'static str {
        r#"# catalog-migrate configuration example
# Copy this file to config.yaml and adjust for your environment

app:
  name: catalog-migrate
  tags:
    environment: staging

# Source and target environments. ${tenant} in the host is replaced by the
# tenant of whichever environment a request is addressed to.
api:
  host: https://${tenant}.example.app
  timeout: 10
# Keys are read from the environment rather than this file:
#   CATALOG_MIGRATE__API__SOURCE__ACCESS_KEY, CATALOG_MIGRATE__API__SOURCE__SECRET_KEY
#   CATALOG_MIGRATE__API__TARGET__ACCESS_KEY, CATALOG_MIGRATE__API__TARGET__SECRET_KEY
  source:
    tenant: source-tenant
  target:
    tenant: target-tenant

# Parallel batch engine
engine:
  max_workers: 5
  min_items_per_worker: 10
  show_progress: true
  spool:
    strategy: auto          # auto, file or memory
    memory_threshold: 5000  # items per worker kept in memory under auto
    # directory: /var/tmp/catalog-migrate

# Output files; a timestamped directory is created when unset
# output:
#   directory: ./migration-output

logging:
  level: info
  format: text  # text, json, or pretty
  output:
    type: stdout
    # type: file
    # path: ./logs/catalog-migrate.log
    # rotation: never  # never, daily or hourly

monitoring:
  metrics_enabled: true
  # metrics_export_path: ./metrics.prom
"#
    }
}
