//! Configuration management for nicoherald
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default content search endpoint
pub const DEFAULT_SEARCH_URL: &str =
    "https://api.search.nicovideo.jp/api/v2/video/contents/search";

/// Default status endpoint of the social feed
pub const DEFAULT_STATUS_URL: &str = "https://api.twitter.com/2/tweets";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Content search configuration
    pub search: SearchConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Announcer configuration
    pub announcer: AnnouncerConfig,

    /// Trigger server configuration
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Content search query and client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search endpoint URL
    pub base_url: String,

    /// Free-text query
    pub query: String,

    /// Fields the query is matched against
    pub targets: String,

    /// Category tag filter
    pub category: String,

    /// Application name sent as `_context`
    pub app_name: String,

    /// User agent header, omitted when empty
    pub user_agent: Option<String>,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Which announcer implementation a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncerMode {
    /// Post to the social feed
    Live,
    /// Log messages only
    DryRun,
}

impl AnnouncerMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "live" => Some(Self::Live),
            "dry_run" | "dry-run" | "dryrun" => Some(Self::DryRun),
            _ => None,
        }
    }
}

/// Social feed credentials and endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncerConfig {
    /// Live or dry-run
    pub mode: AnnouncerMode,

    /// Status post endpoint
    pub status_url: String,

    /// OAuth 2.0 user access token (sent as Bearer token)
    pub access_token: Option<String>,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Trigger server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    pub bind_address: SocketAddr,

    /// Header identifying the scheduler
    pub trigger_header: String,

    /// Value the header must carry
    pub trigger_value: String,

    /// Enable HTTP request logging
    pub enable_request_logging: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let base_url = std::env::var("NICOHERALD_SEARCH_URL")
            .unwrap_or_else(|_| defaults.search.base_url.clone());

        let app_name =
            std::env::var("APP_NAME").unwrap_or_else(|_| defaults.search.app_name.clone());

        let user_agent = std::env::var("USER_AGENT")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let request_timeout_secs = std::env::var("NICOHERALD_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.search.request_timeout_secs);

        let sqlite_path = std::env::var("NICOHERALD_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| defaults.database.sqlite_path.clone());

        let mode = match std::env::var("NICOHERALD_ANNOUNCER") {
            Ok(v) => AnnouncerMode::parse(&v)
                .with_context(|| format!("Unknown announcer mode: {v}"))?,
            Err(_) => defaults.announcer.mode,
        };

        let status_url = std::env::var("NICOHERALD_STATUS_URL")
            .unwrap_or_else(|_| defaults.announcer.status_url.clone());

        let access_token = std::env::var("SOCIAL_ACCESS_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let bind_address = match std::env::var("NICOHERALD_BIND") {
            Ok(v) => v
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid bind address: {v}"))?,
            Err(_) => defaults.server.bind_address,
        };

        let log_level =
            std::env::var("NICOHERALD_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let log_format =
            std::env::var("NICOHERALD_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            search: SearchConfig {
                base_url,
                app_name,
                user_agent,
                request_timeout_secs,
                ..defaults.search
            },
            database: DatabaseConfig { sqlite_path },
            announcer: AnnouncerConfig {
                mode,
                status_url,
                access_token,
                request_timeout_secs: defaults.announcer.request_timeout_secs,
            },
            server: ServerConfig {
                bind_address,
                ..defaults.server
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.search.base_url)
            .with_context(|| format!("Invalid search URL: {}", self.search.base_url))?;

        if self.search.query.trim().is_empty() {
            anyhow::bail!("search query must not be empty");
        }

        if self.search.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.announcer.mode == AnnouncerMode::Live {
            url::Url::parse(&self.announcer.status_url)
                .with_context(|| format!("Invalid status URL: {}", self.announcer.status_url))?;

            if self.announcer.access_token.is_none() {
                anyhow::bail!("live announcer requires an access token");
            }
        }

        if self.server.trigger_header.trim().is_empty() {
            anyhow::bail!("trigger_header must not be empty");
        }

        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SEARCH_URL.to_string(),
            query: String::from("RTA biim"),
            targets: String::from("tags"),
            category: String::from("ゲーム"),
            app_name: format!("nicoherald/{}", env!("CARGO_PKG_VERSION")),
            user_agent: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            database: DatabaseConfig {
                sqlite_path: PathBuf::from("data/videos.db"),
            },
            announcer: AnnouncerConfig {
                mode: AnnouncerMode::DryRun,
                status_url: DEFAULT_STATUS_URL.to_string(),
                access_token: None,
                request_timeout_secs: 15,
            },
            server: ServerConfig {
                bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
                trigger_header: String::from("X-Appengine-Cron"),
                trigger_value: String::from("true"),
                enable_request_logging: true,
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}
