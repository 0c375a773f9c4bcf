use catalog_migrate::{
    client::HttpClientFactory,
    config::{Config, ConfigLoader, LogFormat, LogOutput, LoggingConfig},
    engine::{
        sort_keys, FinalReport, MigrationEngine, ResultMerger, ShutdownSignal, SinkHandle,
    },
    error::{MigrationError, Result},
    migration::{
        self, profile_export_job, read_asset_mappings, tag_import_job, OutputLayout,
        ProfileExporter, TagImporter, ASSET_IMPORT_CATEGORY,
    },
};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Parser)]
#[command(
    name = "catalog-migrate",
    version = env!("CARGO_PKG_VERSION"),
    about = "Parallel export and import of data catalog assets between environments",
    long_about = None
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CATALOG_MIGRATE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides logging.level
    #[arg(short, long, env = "CATALOG_MIGRATE_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export asset profile configurations from the source environment
    ExportProfiles {
        /// Asset mapping CSV (source_id, source_uid, target_id, target_uid, tags)
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV; defaults to <output dir>/asset-import/asset-profiles-import-ready.csv
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override engine.max_workers
        #[arg(long)]
        max_workers: Option<usize>,

        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,
    },
    /// Import asset tags into the target environment
    ImportTags {
        /// Asset mapping CSV (source_id, source_uid, target_id, target_uid, tags)
        #[arg(short, long)]
        input: PathBuf,

        /// Results CSV; defaults to <output dir>/asset-import/asset-tag-import-results.csv
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override engine.max_workers
        #[arg(long)]
        max_workers: Option<usize>,

        /// Look up target assets but do not create any tags
        #[arg(long)]
        dry_run: bool,

        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,
    },
    /// Merge spool files preserved by a failed run into an output file
    Remerge {
        /// Job that produced the spool files
        #[arg(long, value_enum)]
        job: JobKind,

        /// Output CSV to write
        #[arg(short, long)]
        output: PathBuf,

        /// Keep the spool files after a successful merge
        #[arg(long)]
        keep_spool: bool,

        /// Spool files, in worker order
        #[arg(required = true)]
        spool_files: Vec<PathBuf>,
    },
    /// Validate configuration
    Validate,
    /// Print the effective configuration with secrets redacted
    ShowConfig,
    /// Generate sample configuration
    GenerateSample,
    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum JobKind {
    Profiles,
    Tags,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::GenerateSample => {
            println!("{}", ConfigLoader::generate_sample());
            return Ok(());
        }
        Commands::Version => {
            print_version_info();
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(cli.config.as_deref())?;
    let _log_guard = init_tracing(&config.logging, cli.log_level.as_deref())?;
    info!("catalog-migrate v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::ExportProfiles {
            input,
            output,
            max_workers,
            no_progress,
        } => {
            ConfigLoader::validate(&config)?;
            export_profiles(&config, &input, output, max_workers, no_progress)
        }
        Commands::ImportTags {
            input,
            output,
            max_workers,
            dry_run,
            no_progress,
        } => {
            ConfigLoader::validate(&config)?;
            import_tags(&config, &input, output, max_workers, dry_run, no_progress)
        }
        Commands::Remerge {
            job,
            output,
            keep_spool,
            spool_files,
        } => remerge(job, &output, &spool_files, keep_spool),
        Commands::Validate => validate_config(&config),
        Commands::ShowConfig => {
            print!("{}", serde_yaml::to_string(&config.redacted())?);
            Ok(())
        }
        Commands::GenerateSample | Commands::Version => Ok(()),
    }
}

/// The returned guard flushes buffered file logs when dropped
fn init_tracing(
    logging: &LoggingConfig,
    level_override: Option<&str>,
) -> Result<Option<WorkerGuard>> {
    let level = level_override.unwrap_or(&logging.level);
    let filter = format!("catalog_migrate={},warn", level);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let (writer, ansi, guard) = match &logging.output {
        LogOutput::Stdout => (
            BoxMakeWriter::new(std::io::stdout),
            std::io::stdout().is_terminal(),
            None,
        ),
        LogOutput::Stderr => (
            BoxMakeWriter::new(std::io::stderr),
            std::io::stderr().is_terminal(),
            None,
        ),
        LogOutput::File { path, rotation } => {
            let (writer, guard) = tracing_appender::non_blocking(rotation.appender(path)?);
            (BoxMakeWriter::new(writer), false, Some(guard))
        }
    };

    let fmt_layer = match logging.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_thread_names(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_thread_names(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_ansi(ansi)
            .with_writer(writer)
            .event_format(CustomFormatter { ansi })
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| MigrationError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}

// Timestamp, level and [thread-id] before each message
struct CustomFormatter {
    ansi: bool,
}

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for CustomFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        use tracing_subscriber::fmt::time::{ChronoLocal, FormatTime};

        let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string());
        timer.format_time(&mut writer)?;
        write!(writer, " ")?;

        let level = event.metadata().level();
        let (color, label) = match *level {
            tracing::Level::ERROR => ("\x1b[31m", "ERROR"),
            tracing::Level::WARN => ("\x1b[33m", " WARN"),
            tracing::Level::INFO => ("", " INFO"),
            tracing::Level::DEBUG => ("\x1b[36m", "DEBUG"),
            tracing::Level::TRACE => ("\x1b[35m", "TRACE"),
        };
        if self.ansi && !color.is_empty() {
            write!(writer, "{}{}\x1b[0m ", color, label)?;
        } else {
            write!(writer, "{} ", label)?;
        }

        // Worker threads are named worker-<id>; keep the tail so ids stay visible
        let current_thread = std::thread::current();
        let name = current_thread.name().unwrap_or("unnamed");
        let truncated_name = if name.len() > 9 {
            &name[name.len() - 9..]
        } else {
            name
        };
        write!(writer, "[{:9}", truncated_name)?;

        let thread_id = format!("{:?}", current_thread.id());
        if let Some(id_num) = thread_id
            .strip_prefix("ThreadId(")
            .and_then(|s| s.strip_suffix(")"))
        {
            write!(writer, "-{}] ", id_num)?;
        } else {
            write!(writer, "-??] ")?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

fn validate_config(config: &Config) -> Result<()> {
    info!("Validating configuration...");
    ConfigLoader::validate(config)?;

    info!("  Application: {}", config.app.name);
    info!("  API host: {}", config.api.host);
    info!("  Source tenant: {}", config.api.source.tenant);
    match &config.api.target {
        Some(target) => info!("  Target tenant: {}", target.tenant),
        None => info!("  Target environment: not configured"),
    }
    info!(
        "  Workers: up to {} (min {} items each)",
        config.engine.max_workers, config.engine.min_items_per_worker
    );
    info!("Configuration is valid");
    Ok(())
}

fn build_engine(
    config: &Config,
    max_workers: Option<usize>,
    no_progress: bool,
    unit: &str,
) -> Result<MigrationEngine<HttpClientFactory>> {
    let mut engine_config = config.engine.clone();
    if let Some(max_workers) = max_workers {
        engine_config.max_workers = max_workers;
    }
    if no_progress {
        engine_config.show_progress = false;
    }

    let shutdown = ShutdownSignal::new();
    shutdown.install_ctrl_c_handler()?;

    let factory = HttpClientFactory::new(config.api.clone());
    Ok(MigrationEngine::new(engine_config, factory)?
        .with_shutdown(shutdown)
        .with_terminal_progress(unit))
}

fn resolve_output(config: &Config, output: Option<PathBuf>, filename: &str) -> Result<PathBuf> {
    match output {
        Some(path) => Ok(path),
        None => {
            OutputLayout::from_config(&config.output).path_for(ASSET_IMPORT_CATEGORY, filename)
        }
    }
}

fn export_profiles(
    config: &Config,
    input: &Path,
    output: Option<PathBuf>,
    max_workers: Option<usize>,
    no_progress: bool,
) -> Result<()> {
    let mappings = read_asset_mappings(input)?;
    let output = resolve_output(config, output, migration::profiles::PROFILE_OUTPUT_FILE)?;
    info!(
        "Exporting profiles for {} assets to {}",
        mappings.len(),
        output.display()
    );

    let job = profile_export_job(output);
    let engine = build_engine(config, max_workers, no_progress, "assets")?;
    let report = engine
        .run(&job, &mappings, &ProfileExporter)
        .map_err(|e| remerge_hint(e, "profiles"))?;
    finish_run(config, report)
}

fn import_tags(
    config: &Config,
    input: &Path,
    output: Option<PathBuf>,
    max_workers: Option<usize>,
    dry_run: bool,
    no_progress: bool,
) -> Result<()> {
    if config.api.target.is_none() {
        return Err(MigrationError::Config(
            "import-tags requires api.target credentials".to_string(),
        ));
    }

    let mappings = TagImporter::select(read_asset_mappings(input)?);
    if mappings.is_empty() {
        info!("No assets with tags found in {}", input.display());
    }
    let output = resolve_output(config, output, migration::tags::TAG_OUTPUT_FILE)?;
    info!(
        "Importing tags for {} assets{}",
        mappings.len(),
        if dry_run { " (dry run)" } else { "" }
    );

    let job = tag_import_job(output);
    let engine = build_engine(config, max_workers, no_progress, "assets")?;
    let report = engine
        .run(&job, &mappings, &TagImporter::new(dry_run))
        .map_err(|e| remerge_hint(e, "tags"))?;
    finish_run(config, report)
}

fn remerge_hint(e: MigrationError, job: &str) -> MigrationError {
    if let MigrationError::Merge { output, preserved, .. } = &e {
        error!("Worker output was preserved in {} spool file(s)", preserved.len());
        let files: Vec<String> = preserved.iter().map(|p| p.display().to_string()).collect();
        eprintln!(
            "Retry the merge with:\n  catalog-migrate remerge --job {} --output {} {}",
            job,
            output.display(),
            files.join(" ")
        );
    }
    e
}

fn finish_run(config: &Config, report: FinalReport) -> Result<()> {
    println!("{}", report);

    for failure in report.failures() {
        warn!("Item {} failed: {}", failure.index, failure.error);
    }

    if config.monitoring.metrics_enabled {
        if let Some(path) = &config.monitoring.metrics_export_path {
            match catalog_migrate::metrics::export_metrics() {
                Ok(text) => fs::write(path, text)?,
                Err(e) => warn!("Failed to export metrics: {}", e),
            }
        }
    }

    if report.cancelled {
        return Err(MigrationError::Cancelled(format!(
            "{} of {} items were not processed",
            report.total_unprocessed, report.total_items
        )));
    }
    Ok(())
}

fn remerge(job: JobKind, output: &Path, spool_files: &[PathBuf], keep_spool: bool) -> Result<()> {
    let header = match job {
        JobKind::Profiles => migration::profiles::PROFILE_HEADER,
        JobKind::Tags => migration::tags::TAG_HEADER,
    };
    let merger = ResultMerger::new(header, output);
    let rows = merger.remerge(spool_files, sort_keys::column_case_insensitive(0))?;
    println!("Merged {} rows into {}", rows, merger.output_path().display());

    if !keep_spool {
        for path in spool_files {
            if let Err(e) = SinkHandle::from_preserved(path).discard() {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
    Ok(())
}

fn print_version_info() {
    println!("catalog-migrate v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Parallel export and import of data catalog assets between environments");
}
