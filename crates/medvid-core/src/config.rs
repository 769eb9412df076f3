use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Environment variable holding the database connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Environment variable holding the video platform API key.
pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";
/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "MEDVID_CONFIG";

/// Top-level configuration for medvid.
///
/// Loaded from `~/.medvid/config.toml` by default. The database URL and API
/// key may also come from the process environment, which takes precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedvidConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl MedvidConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MedvidConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `DATABASE_URL` and `YOUTUBE_API_KEY` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.storage.database_url = url;
        }
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.fetch.api_key = Some(key);
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Connection string: `sqlite://<path>`, `sqlite:<path>`, a bare path, or `:memory:`.
    pub database_url: String,
    /// Connection attempts before giving up.
    pub connect_attempts: u32,
    /// Fixed delay between connection attempts, in milliseconds.
    pub connect_retry_delay_ms: u64,
    /// SQLite busy timeout, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://~/.medvid/medvid.db".to_string(),
            connect_attempts: 5,
            connect_retry_delay_ms: 2000,
            busy_timeout_ms: 5000,
        }
    }
}

/// Video platform API settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// API key. Usually supplied through `YOUTUBE_API_KEY` instead.
    pub api_key: Option<String>,
    /// Base URL of the Data API.
    pub api_base_url: String,
    /// Results requested when `--max-results` is not given.
    pub default_max_results: usize,
    /// Page size for search and hydrate requests (the API caps this at 50).
    pub page_size: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            default_max_results: 1000,
            page_size: 50,
            request_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base_url", &self.api_base_url)
            .field("default_max_results", &self.default_max_results)
            .field("page_size", &self.page_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Default config file path for the current platform.
pub fn default_config_path() -> PathBuf {
    expand_home("~/.medvid/config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MedvidError;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = MedvidConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.storage.connect_attempts, 5);
        assert_eq!(config.storage.connect_retry_delay_ms, 2000);
        assert_eq!(config.fetch.default_max_results, 1000);
        assert_eq!(config.fetch.page_size, 50);
        assert!(config.fetch.api_key.is_none());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[storage]
database_url = "sqlite:///var/lib/medvid/videos.db"
connect_attempts = 3
connect_retry_delay_ms = 100
busy_timeout_ms = 1000

[fetch]
default_max_results = 200
"#;
        let file = create_temp_config(content);
        let config = MedvidConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.storage.database_url, "sqlite:///var/lib/medvid/videos.db");
        assert_eq!(config.storage.connect_attempts, 3);
        assert_eq!(config.fetch.default_max_results, 200);
        // Unspecified fields keep their defaults.
        assert_eq!(config.fetch.page_size, 50);
        assert_eq!(config.fetch.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_partial_config() {
        let file = create_temp_config("[storage]\nconnect_attempts = 1\n");
        let config = MedvidConfig::load(file.path()).unwrap();
        assert_eq!(config.storage.connect_attempts, 1);
        assert_eq!(config.storage.connect_retry_delay_ms, 2000);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is not [valid toml");
        let result = MedvidConfig::load(file.path());
        assert!(matches!(result, Err(MedvidError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_not_found() {
        let err = MedvidConfig::load(Path::new("/nonexistent/medvid.toml")).unwrap_err();
        assert!(matches!(err, MedvidError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let mut config = MedvidConfig::default();
        config.fetch.api_key = Some("from-file".to_string());

        let env: HashMap<&str, &str> = HashMap::from([
            (DATABASE_URL_ENV, "sqlite:///tmp/override.db"),
            (API_KEY_ENV, "from-env"),
        ]);
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.storage.database_url, "sqlite:///tmp/override.db");
        assert_eq!(config.fetch.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let mut config = MedvidConfig::default();
        config.apply_overrides_from(|_| Some("  ".to_string()));
        assert_eq!(config.storage.database_url, StorageConfig::default().database_url);
        assert!(config.fetch.api_key.is_none());
    }

    #[test]
    fn test_fetch_config_debug_redacts_key() {
        let config = FetchConfig {
            api_key: Some("super-secret".to_string()),
            ..FetchConfig::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/tmp/x.db"), PathBuf::from("/tmp/x.db"));
        assert!(!expand_home("~/x.db").to_string_lossy().starts_with('~'));
    }
}
