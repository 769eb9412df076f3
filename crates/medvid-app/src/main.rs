//! medvid-ingest binary - composition root.
//!
//! 1. Parse arguments (usage errors exit 1 before any work)
//! 2. Load configuration from TOML plus environment overrides
//! 3. Build the API client, then connect to the database and initialize the schema
//! 4. Fetch, store and output through the ingestion job
//! 5. Close the database, also when SIGINT/SIGTERM cut the run short

mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use medvid_core::config::MedvidConfig;
use medvid_core::error::{MedvidError, Result};
use medvid_fetch::YouTubeClient;
use medvid_ingest::{IngestJob, IngestReport};
use medvid_storage::Database;

use cli::CliArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(cli::usage_exit_code(&e));
        }
    };

    let config_path = args.resolve_config_path();
    let loaded = MedvidConfig::load(&config_path);

    let log_level = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.general.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    init_tracing(&log_level);

    info!("Starting medvid-ingest v{}", env!("CARGO_PKG_VERSION"));
    let mut config = config_or_default(loaded, &config_path);
    config.apply_env_overrides();

    match run(&args, &config).await {
        Ok(report) => {
            info!(
                fetched = report.records.len(),
                stored = report.batch.stored_count(),
                failed = report.batch.failed_count(),
                "Run finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout is reserved for JSON lines.
fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn config_or_default(loaded: Result<MedvidConfig>, path: &Path) -> MedvidConfig {
    match loaded {
        Ok(config) => {
            info!(path = %path.display(), "Configuration loaded");
            config
        }
        Err(MedvidError::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No configuration file, using defaults");
            MedvidConfig::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load configuration, using defaults");
            MedvidConfig::default()
        }
    }
}

/// Build the client, connect, ingest, then close the database on every path
/// out. Configuration errors surface before the database is touched.
async fn run(args: &CliArgs, config: &MedvidConfig) -> Result<IngestReport> {
    let client = YouTubeClient::new(&config.fetch)?;

    let db = tokio::select! {
        db = Database::connect(&config.storage) => Arc::new(db?),
        _ = shutdown_signal() => return Err(MedvidError::ShuttingDown),
    };

    let result = ingest(args, config, client, Arc::clone(&db)).await;
    close_database(db);
    result
}

async fn ingest(
    args: &CliArgs,
    config: &MedvidConfig,
    client: YouTubeClient,
    db: Arc<Database>,
) -> Result<IngestReport> {
    let job = IngestJob::new(client, db);

    let target = args.target(config.fetch.default_max_results);
    let plan = args.output_plan();
    let mut stdout = std::io::stdout();

    tokio::select! {
        result = job.run(&target, &plan, &mut stdout) => result,
        _ = shutdown_signal() => Err(MedvidError::ShuttingDown),
    }
}

fn close_database(db: Arc<Database>) {
    match Arc::try_unwrap(db) {
        Ok(db) => match db.close() {
            Ok(()) => info!("Database closed"),
            Err(e) => warn!(error = %e, "Failed to close database"),
        },
        Err(_) => warn!("Database still in use at shutdown, leaving it to drop"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Signal received, aborting run");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("medvid.db");

        let mut config = MedvidConfig::default();
        config.storage.database_url = format!("sqlite://{}", db_path.display());
        config.fetch.api_key = None;

        let args = CliArgs::try_parse_from(["medvid-ingest", "--video-id", "abc"]).unwrap();
        let err = run(&args, &config).await.unwrap_err();

        assert!(matches!(err, MedvidError::Config(_)));
        assert!(!db_path.exists());
    }

    #[test]
    fn test_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("absent.toml");
        let config = config_or_default(MedvidConfig::load(&missing), &missing);
        assert_eq!(config.storage.connect_attempts, 5);

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "not [valid toml").unwrap();
        let config = config_or_default(MedvidConfig::load(&broken), &broken);
        assert_eq!(config.general.log_level, "info");

        let valid = dir.path().join("medvid.toml");
        std::fs::write(&valid, "[general]\nlog_level = \"debug\"\n").unwrap();
        let config = config_or_default(MedvidConfig::load(&valid), &valid);
        assert_eq!(config.general.log_level, "debug");
    }
}
