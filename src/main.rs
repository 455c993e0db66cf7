//! whisper-migrate
//!
//! Streams Graphite whisper archives into InfluxDB:
//! - conversion rules map series keys to measurement, tags and field
//! - files are extracted concurrently and merged into one point stream
//! - points are written in per-retention-policy batches with retries

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use influx_client::{health, InfluxClient, InfluxConfig};
use migrate_core::RuleSet;
use migrate_pipeline::{prepare_target, BatchingSink, Migration, MigrationConfig, SinkConfig};
use telemetry::{init_tracing_from_env, metrics};

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "whisper-migrate",
    version,
    about = "Migrate Graphite whisper archives into InfluxDB"
)]
struct Args {
    /// Root directory of the whisper tree
    #[arg(long, env = "MIGRATE_WHISPER_DIR")]
    whisper_dir: PathBuf,

    /// Configuration file (TOML); defaults to config/default.toml if present
    #[arg(long, env = "MIGRATE_CONFIG")]
    config: Option<PathBuf>,

    /// Read and convert everything but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Answer yes to every confirmation
    #[arg(long)]
    yes: bool,
}

/// Application configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    influx: InfluxConfig,

    #[serde(default)]
    migration: MigrationConfig,

    #[serde(default)]
    rules: RuleSet,
}

impl Config {
    fn check(&self) -> migrate_core::Result<()> {
        self.influx.check()?;
        self.migration.check()
    }

    /// Fill administrative defaults from the write settings.
    fn resolve(&mut self) {
        if self.migration.database.is_empty() {
            self.migration.database = self.influx.database.clone();
        }
        if self.migration.host.is_empty() {
            if let Some(first) = self.influx.addresses.first() {
                self.migration.host = first.clone();
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    let args = Args::parse();
    let run_id = Uuid::new_v4();

    info!("Starting whisper-migrate v{}", env!("CARGO_PKG_VERSION"));

    let span = tracing::info_span!("migration", run_id = %run_id);
    run(args).instrument(span).await
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    if args.dry_run {
        config.influx.enabled = false;
    }
    config.resolve();
    config.check().context("Invalid configuration")?;

    info!(
        whisper_dir = %args.whisper_dir.display(),
        rules = config.rules.len(),
        addresses = ?config.influx.addresses,
        database = %config.influx.database,
        enabled = config.influx.enabled,
        "Loaded configuration"
    );
    if config.rules.is_empty() {
        warn!("No conversion rules configured, every series will be skipped");
    }

    let client =
        InfluxClient::new(config.influx.clone()).context("Failed to create InfluxDB client")?;

    let mut policies = Vec::new();
    if config.influx.enabled {
        if health::check_connection(&client).await {
            info!("InfluxDB connection: healthy");
        } else {
            error!("InfluxDB connection: unhealthy, writes will be retried");
        }

        let admin = InfluxClient::for_host(
            &config.influx,
            &config.migration.host,
            &config.migration.database,
        )
        .context("Failed to create InfluxDB admin client")?;

        let assume_yes = args.yes;
        policies = prepare_target(&config.migration, &admin, &args.whisper_dir, |question| {
            assume_yes || confirm(question)
        })
        .await
        .context("Failed to prepare target database")?;
    } else {
        info!("Dry run, nothing will be written");
    }

    let sink_config = SinkConfig::from_influx(&config.influx)?
        .with_policies(policies, config.migration.default_retention_policy.clone());
    let sink = BatchingSink::new(Arc::new(client), sink_config);

    let progress = config.migration.progress_interval().map(|period| {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                metrics().log_progress();
            }
        })
    });

    let migration = Migration::new(
        Arc::new(config.rules),
        &args.whisper_dir,
        &config.migration,
    );
    let result = migration.run(&sink).await;

    if let Some(handle) = progress {
        handle.abort();
    }

    let summary = result.context("Migration failed")?;
    summary.log();
    match serde_json::to_string(&metrics().snapshot()) {
        Ok(json) => info!(metrics = %json, "Final metrics"),
        Err(e) => warn!("Failed to serialize metrics snapshot: {}", e),
    }

    if summary.has_write_failures() {
        error!(
            batches_failed = summary.batches_failed,
            points_failed = summary.points_failed,
            "Some batches could not be written"
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Load configuration from defaults, file and environment.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name("config/default").required(false),
    };

    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(file.format(config::FileFormat::Toml))
        // Override with environment variables, e.g. MIGRATE__INFLUX__DATABASE
        .add_source(
            config::Environment::default()
                .prefix("MIGRATE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("influx.addresses")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Ask a yes/no question on the terminal.
fn confirm(question: &str) -> bool {
    print!("{} [y/N] ", question);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}
