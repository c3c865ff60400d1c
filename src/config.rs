//! Configuration types for vidqueue

use crate::error::{Error, Result};
use crate::types::Weekday;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Engine behavior configuration (worker pool sizes, polling cadence, retention)
///
/// Groups settings related to how the dispatcher leases and retries tasks.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EngineConfig {
    /// Maximum concurrently running sync tasks (default: 2)
    #[serde(default = "default_max_sync_workers")]
    pub max_sync_workers: usize,

    /// Maximum concurrently running download tasks (default: 3)
    #[serde(default = "default_max_download_workers")]
    pub max_download_workers: usize,

    /// Dispatcher poll interval when idle (default: 5 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Heartbeat interval for SSE streams with no changes to report (default: 15 seconds)
    #[serde(default = "default_heartbeat_interval", with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// Days to retain completed/failed task rows before pruning (default: 30)
    #[serde(default = "default_data_retention_days")]
    pub data_retention_days: u32,

    /// Retry policy applied to transient task failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_sync_workers: default_max_sync_workers(),
            max_download_workers: default_max_download_workers(),
            poll_interval: default_poll_interval(),
            heartbeat_interval: default_heartbeat_interval(),
            data_retention_days: default_data_retention_days(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient task failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of attempts before a task is marked failed (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before the first retry (default: 30 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 1 hour)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Media extraction/download backend configuration
///
/// Configures the external CLI [`crate::media_backend::ProcessMediaBackend`]
/// shells out to. No concrete extractor binary ships with this crate; this
/// only names where to find one and how hard to push it.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MediaBackendConfig {
    /// Extractor binary, resolved via `$PATH` if not absolute (default: "yt-dlp")
    #[serde(default = "default_media_backend_command")]
    pub command: String,

    /// Directory downloaded files are written under (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Additional raw arguments appended to every backend invocation
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Maximum concurrent full-metadata fetches during a sync (default: 5)
    #[serde(default = "default_max_concurrent_metadata_fetches")]
    pub max_concurrent_metadata_fetches: usize,
}

impl Default for MediaBackendConfig {
    fn default() -> Self {
        Self {
            command: default_media_backend_command(),
            output_dir: default_output_dir(),
            extra_args: Vec::new(),
            max_concurrent_metadata_fetches: default_max_concurrent_metadata_fetches(),
        }
    }
}

/// Data storage configuration
///
/// Groups settings related to the relational store backing the task queue and
/// catalog of profiles/lists/videos.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StoreConfig {
    /// Database connection string (default: "sqlite://./vidqueue.db")
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Use `DELETE` journaling instead of `WAL` (required on network shares; default: false)
    #[serde(default)]
    pub network_share: bool,

    /// Maximum number of pooled connections (default: 10)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            network_share: false,
            max_connections: default_max_connections(),
        }
    }
}

/// Notification configuration (webhooks and scripts)
///
/// Groups settings for external notifications triggered by task-queue events.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct NotificationConfig {
    /// Webhook sinks
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,

    /// Script sinks
    #[serde(default)]
    pub scripts: Vec<ScriptConfig>,
}

/// A single webhook notification sink
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookConfig {
    /// Human-readable name
    pub name: String,

    /// Target URL
    pub url: String,

    /// Event kinds this sink receives (empty = all)
    #[serde(default)]
    pub events: Vec<String>,

    /// Request timeout (default: 10 seconds)
    #[serde(default = "default_webhook_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Extra HTTP headers to send (e.g. auth tokens)
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// A single script notification sink, invoked as a subprocess
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ScriptConfig {
    /// Human-readable name
    pub name: String,

    /// Path to the executable
    pub path: PathBuf,

    /// Event kinds this sink receives (empty = all)
    #[serde(default)]
    pub events: Vec<String>,

    /// Process timeout (default: 30 seconds)
    #[serde(default = "default_script_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Main configuration for the task engine and API server
///
/// Fields are organized into logical sub-configs for maintainability:
/// - [`store`](StoreConfig) — database connection and pooling
/// - [`engine`](EngineConfig) — worker pool sizes, polling, retries
/// - [`notifications`](NotificationConfig) — webhooks and scripts
/// - [`server`](ServerConfig) — REST API bind address and CORS
///
/// Sub-config fields are flattened for a single flat JSON/TOML surface, matching
/// the shape consumers of the teacher crate would already expect.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Database connection and pooling
    #[serde(flatten)]
    pub store: StoreConfig,

    /// Worker pool sizes, polling cadence, retry policy
    #[serde(flatten)]
    pub engine: EngineConfig,

    /// Webhook and script notification sinks
    #[serde(flatten)]
    pub notifications: NotificationConfig,

    /// External extractor/downloader CLI
    #[serde(flatten)]
    pub media_backend: MediaBackendConfig,

    /// REST API bind address, CORS, Swagger UI
    #[serde(flatten)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration by layering defaults, an optional TOML file, then
    /// environment variable overrides — in that order of increasing precedence.
    ///
    /// Recognized environment variables: `DATABASE_URL`, `MAX_SYNC_WORKERS`,
    /// `MAX_DOWNLOAD_WORKERS`, `DATA_RETENTION_DAYS`, `SQLITE_NETWORK_SHARE`,
    /// `POLL_INTERVAL_SECS`, `HEARTBEAT_INTERVAL_SECS`, `BIND_ADDRESS`.
    pub fn load(file_path: Option<&std::path::Path>) -> Result<Self> {
        let mut config = match file_path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
                toml::from_str(&contents)
                    .map_err(|e| Error::Config { message: e.to_string(), key: None })?
            }
            None => Config::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.store.database_url = v;
        }
        if let Ok(v) = std::env::var("MAX_SYNC_WORKERS") {
            self.engine.max_sync_workers = parse_env("MAX_SYNC_WORKERS", &v)?;
        }
        if let Ok(v) = std::env::var("MAX_DOWNLOAD_WORKERS") {
            self.engine.max_download_workers = parse_env("MAX_DOWNLOAD_WORKERS", &v)?;
        }
        if let Ok(v) = std::env::var("DATA_RETENTION_DAYS") {
            self.engine.data_retention_days = parse_env("DATA_RETENTION_DAYS", &v)?;
        }
        if let Ok(v) = std::env::var("SQLITE_NETWORK_SHARE") {
            self.store.network_share = parse_env("SQLITE_NETWORK_SHARE", &v)?;
        }
        if let Ok(v) = std::env::var("POLL_INTERVAL_SECS") {
            self.engine.poll_interval = Duration::from_secs(parse_env("POLL_INTERVAL_SECS", &v)?);
        }
        if let Ok(v) = std::env::var("HEARTBEAT_INTERVAL_SECS") {
            self.engine.heartbeat_interval =
                Duration::from_secs(parse_env("HEARTBEAT_INTERVAL_SECS", &v)?);
        }
        if let Ok(v) = std::env::var("MEDIA_BACKEND_COMMAND") {
            self.media_backend.command = v;
        }
        if let Ok(v) = std::env::var("DOWNLOAD_OUTPUT_DIR") {
            self.media_backend.output_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("BIND_ADDRESS") {
            self.server.bind_address = v
                .parse()
                .map_err(|_| Error::Config { message: format!("invalid bind address: {v}"), key: Some("BIND_ADDRESS".into()) })?;
        }
        Ok(())
    }

    /// Reject configurations that would leave the engine unable to make progress.
    pub fn validate(&self) -> Result<()> {
        if self.store.database_url.trim().is_empty() {
            return Err(Error::Config {
                message: "database_url must not be empty".into(),
                key: Some("database_url".into()),
            });
        }
        if self.engine.max_sync_workers == 0 {
            return Err(Error::Config {
                message: "max_sync_workers must be at least 1".into(),
                key: Some("max_sync_workers".into()),
            });
        }
        if self.engine.max_download_workers == 0 {
            return Err(Error::Config {
                message: "max_download_workers must be at least 1".into(),
                key: Some("max_download_workers".into()),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| Error::Config {
        message: format!("invalid value for {key}: {value}"),
        key: Some(key.to_string()),
    })
}

/// REST API server configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// A configured download-permission window, used by [`crate::schedule_gate::ScheduleGate`]
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ScheduleWindow {
    /// Human-readable name
    pub name: String,

    /// Days this window applies (empty matches no day)
    #[serde(default)]
    pub days: Vec<Weekday>,

    /// Start time, `HH:MM` 24-hour
    pub start_time: String,

    /// End time, `HH:MM` 24-hour; a value less than `start_time` wraps past midnight
    pub end_time: String,

    /// Whether downloads are allowed (true) or blocked (false) during this window
    #[serde(default = "default_true")]
    pub allow: bool,
}

fn default_max_sync_workers() -> usize {
    2
}

fn default_max_download_workers() -> usize {
    3
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_data_retention_days() -> u32 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(3600)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_database_url() -> String {
    "sqlite://./vidqueue.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_media_backend_command() -> String {
    "yt-dlp".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent_metadata_fetches() -> usize {
    5
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_script_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_bind_address() -> SocketAddr {
    "127.0.0.1:8080".parse().expect("valid default bind address")
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        if secs < 0 {
            return Err(serde::de::Error::custom("duration seconds must not be negative"));
        }
        Ok(Duration::from_secs(secs as u64))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_database_url() {
        let mut config = Config::default();
        config.store.database_url = "".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_sync_workers() {
        let mut config = Config::default();
        config.engine.max_sync_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_download_workers() {
        let mut config = Config::default();
        config.engine.max_download_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_take_precedence_over_defaults() {
        std::env::set_var("MAX_SYNC_WORKERS", "7");
        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        std::env::remove_var("MAX_SYNC_WORKERS");
        assert_eq!(config.engine.max_sync_workers, 7);
    }

    #[test]
    fn env_override_rejects_non_numeric_value() {
        std::env::set_var("MAX_DOWNLOAD_WORKERS", "not-a-number");
        let mut config = Config::default();
        let result = config.apply_env_overrides();
        std::env::remove_var("MAX_DOWNLOAD_WORKERS");
        assert!(result.is_err());
    }

    #[test]
    fn duration_serde_serializes_as_seconds() {
        let json = serde_json::to_string(&Duration::from_secs(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.engine.max_sync_workers, config.engine.max_sync_workers);
    }
}
