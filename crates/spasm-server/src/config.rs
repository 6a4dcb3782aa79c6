//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use spasm_types::{AppConfig, FeedChannel, FeedConfig};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

use crate::pacing::Pacing;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    /// Defaults for the process-wide [`AppConfig`]; stored values override
    /// them at startup.
    #[serde(default)]
    pub app: AppDefaults,
    #[serde(default)]
    pub rss: RssConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL, used for feed self links when a request carries no
    /// `Host` header.
    #[serde(default)]
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"spasm_server=debug,info"`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Fixed delays applied before writing event responses. Zero disables.
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_feed_delay_ms")]
    pub feed_delay_ms: u64,
    #[serde(default = "default_event_delay_ms")]
    pub event_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppDefaults {
    #[serde(default)]
    pub enable_short_urls_for_web3_actions: bool,
    #[serde(default = "default_short_id_length")]
    pub short_urls_length_of_web3_ids: usize,
    #[serde(default = "default_max_comments_depth")]
    pub max_comments_depth: u32,
}

/// Channel metadata for RSS output.
#[derive(Debug, Clone, Deserialize)]
pub struct RssConfig {
    #[serde(default = "default_rss_title")]
    pub title: String,
    #[serde(default = "default_rss_link")]
    pub link: String,
    #[serde(default = "default_rss_description")]
    pub description: String,
    #[serde(default = "default_rss_image_url")]
    pub image_url: Option<String>,
    /// Base for item links; defaults to `<link>/news`.
    #[serde(default)]
    pub custom_domain: Option<String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> String {
    "spasm.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_feed_delay_ms() -> u64 {
    200
}

fn default_event_delay_ms() -> u64 {
    300
}

fn default_short_id_length() -> usize {
    AppConfig::default().short_urls_length_of_web3_ids
}

fn default_max_comments_depth() -> u32 {
    AppConfig::default().max_comments_depth
}

fn default_rss_title() -> String {
    "Spasm".to_string()
}

fn default_rss_link() -> String {
    "https://forum.spasm.network".to_string()
}

fn default_rss_description() -> String {
    "Unplug from slave tech!".to_string()
}

fn default_rss_image_url() -> Option<String> {
    Some("https://media.spasm.network/spasmim016863a1cae922c77a970a86e0d339455d6417c6106125b8ebac744e50f51581a9.jpeg".to_string())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            feed_delay_ms: default_feed_delay_ms(),
            event_delay_ms: default_event_delay_ms(),
        }
    }
}

impl Default for AppDefaults {
    fn default() -> Self {
        Self {
            enable_short_urls_for_web3_actions: false,
            short_urls_length_of_web3_ids: default_short_id_length(),
            max_comments_depth: default_max_comments_depth(),
        }
    }
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            title: default_rss_title(),
            link: default_rss_link(),
            description: default_rss_description(),
            image_url: default_rss_image_url(),
            custom_domain: None,
        }
    }
}

impl PacingConfig {
    pub fn pacing(&self) -> Pacing {
        Pacing {
            feed_delay: Duration::from_millis(self.feed_delay_ms),
            event_delay: Duration::from_millis(self.event_delay_ms),
        }
    }
}

impl AppDefaults {
    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            enable_short_urls_for_web3_actions: self.enable_short_urls_for_web3_actions,
            short_urls_length_of_web3_ids: self.short_urls_length_of_web3_ids,
            max_comments_depth: self.max_comments_depth,
        }
    }
}

impl RssConfig {
    /// The feed configuration template cloned by every RSS request.
    pub fn feed_config(&self) -> FeedConfig {
        let custom_domain = self
            .custom_domain
            .clone()
            .unwrap_or_else(|| format!("{}/news", self.link.trim_end_matches('/')));

        FeedConfig {
            channel: FeedChannel {
                title: self.title.clone(),
                link: self.link.clone(),
                description: self.description.clone(),
                image_url: self.image_url.clone(),
                full_uri: None,
            },
            filters: None,
            custom_domain: Some(custom_domain),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults when the
/// file does not exist.
///
/// Environment variable overrides:
/// - `SPASM_HOST`, `SPASM_PORT` override `server.host` / `server.port`
/// - `SPASM_DB_PATH` overrides `database.path`
/// - `SPASM_LOG_LEVEL`, `SPASM_LOG_JSON` override `logging.*`
/// - `SPASM_FEED_DELAY_MS`, `SPASM_EVENT_DELAY_MS` override `pacing.*`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("SPASM_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = host;
    }
    if let Some(port) = var("SPASM_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = port;
    }
    if let Some(db_path) = var("SPASM_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("SPASM_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("SPASM_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(ms) = var("SPASM_FEED_DELAY_MS").and_then(|v| v.parse().ok()) {
        config.pacing.feed_delay_ms = ms;
    }
    if let Some(ms) = var("SPASM_EVENT_DELAY_MS").and_then(|v| v.parse().ok()) {
        config.pacing.event_delay_ms = ms;
    }
}
