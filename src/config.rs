//! Runtime configuration
//!
//! The original deployment loads a small JSON config at startup (the API base
//! URL plus a few intervals). The config is an explicit value handed to each
//! collaborator at construction; nothing reads it from a global.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default history page size for message loads
pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Default presence poll interval in seconds
pub const DEFAULT_PRESENCE_POLL_SECS: u64 = 300;

/// Default keep-alive ping interval in seconds
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 120;

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Application configuration
///
/// Loaded from a JSON file at startup. A missing or empty file yields the
/// defaults; a malformed file is an error.
///
/// # Example
/// ```rust,no_run
/// use hubchat::config::Config;
///
/// let config = Config::load("hubchat.json").expect("Failed to load config");
/// println!("API base: {}", config.api_url);
/// println!("Hub endpoint: {}", config.hub_url());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the REST API, e.g. "http://localhost:5134/api"
    pub api_url: String,
    /// Number of messages fetched per history page
    pub page_size: usize,
    /// Interval between online-roster refreshes, in seconds
    pub presence_poll_secs: u64,
    /// Interval between keep-alive pings on the push channel, in seconds
    pub ping_interval_secs: u64,
    /// Per-request HTTP timeout, in seconds
    pub request_timeout_secs: u64,
    /// Directory holding persisted client state (auth session file)
    pub state_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            presence_poll_secs: DEFAULT_PRESENCE_POLL_SECS,
            ping_interval_secs: DEFAULT_PING_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            state_dir: ".".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to the config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file doesn't exist
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Derive the push-channel URL from the API base URL
    ///
    /// The hub lives next to the API on the same host: a trailing `/api`
    /// segment is stripped from the base and `/hubs/chat` appended. The
    /// scheme is converted to its WebSocket counterpart (`http` -> `ws`,
    /// `https` -> `wss`). An empty base degenerates to `/hubs/chat`.
    pub fn hub_url(&self) -> String {
        let base = self.api_url.trim();
        if base.is_empty() {
            return "/hubs/chat".to_string();
        }

        let mut trimmed = base.trim_end_matches('/');
        if trimmed.ends_with("/api") {
            trimmed = &trimmed[..trimmed.len() - "/api".len()];
        }

        let rebased = if let Some(rest) = trimmed.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            trimmed.to_string()
        };

        format!("{}/hubs/chat", rebased)
    }

    /// Path of the persisted auth session file under `state_dir`
    pub fn auth_state_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join("auth_state.json")
    }
}
