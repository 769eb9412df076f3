//! CLI argument definitions for medvid-ingest.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use medvid_core::config::{default_config_path, CONFIG_PATH_ENV};
use medvid_ingest::{IngestTarget, OutputPlan};

/// Fetch patient-experience video metadata and store it in the local database.
#[derive(Parser, Debug)]
#[command(name = "medvid-ingest", version, about)]
#[command(group(ArgGroup::new("target").required(true).args(["disease", "video_id"])))]
pub struct CliArgs {
    /// Disease name to search for.
    #[arg(long = "disease")]
    pub disease: Option<String>,

    /// Maximum number of search results (default 1000).
    #[arg(long = "max-results")]
    pub max_results: Option<usize>,

    /// Write fetched records to this file as a JSON array.
    #[arg(long = "output-file")]
    pub output_file: Option<PathBuf>,

    /// Write fetched video IDs to this file as a JSON array.
    #[arg(long = "video-ids-file")]
    pub video_ids_file: Option<PathBuf>,

    /// Fetch a single video by ID instead of searching.
    #[arg(long = "video-id")]
    pub video_id: Option<String>,

    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > MEDVID_CONFIG env var > ~/.medvid/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
            if !p.trim().is_empty() {
                return PathBuf::from(p);
            }
        }
        default_config_path()
    }

    /// What to fetch. `default_max_results` applies when --max-results is absent.
    pub fn target(&self, default_max_results: usize) -> IngestTarget {
        match (&self.video_id, &self.disease) {
            (Some(id), _) => IngestTarget::VideoId(id.clone()),
            (None, disease) => IngestTarget::Disease {
                name: disease.clone().unwrap_or_default(),
                max_results: self.max_results.unwrap_or(default_max_results),
            },
        }
    }

    pub fn output_plan(&self) -> OutputPlan {
        OutputPlan {
            output_file: self.output_file.clone(),
            video_ids_file: self.video_ids_file.clone(),
        }
    }
}

/// Process exit code for a failed parse. Help and version requests print to
/// stdout and exit 0; every usage error exits 1.
pub fn usage_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}
