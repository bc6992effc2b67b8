//! Configuration management.

use crate::{CoreError, CoreResult, Paths, ProgressionRules};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Production backend.
pub const DEFAULT_SERVER_URL: &str = "https://klcp.alie.info/";

/// Hosts tried in order once retries against the active host are exhausted.
pub const DEFAULT_FALLBACK_HOSTS: [&str; 6] = [
    "http://192.168.44.1:3000/",
    "http://192.168.178.27:3000/",
    "http://localhost:3000/",
    "https://klcp.alie.info/",
    "https://188.245.153.241/",
    "http://188.245.153.241:3000/",
];

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Six hours between background syncs.
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 6 * 60 * 60;

/// Retry knobs for the remote gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts against the active host before falling back.
    pub max_retries: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_retry_delay_ms: u64,
    /// Cap for the doubling delay, in milliseconds.
    pub max_retry_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay_ms: 1000,
            max_retry_delay_ms: 8000,
        }
    }
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Default backend base URL.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Ordered fallback hosts.
    #[serde(default = "default_fallback_hosts")]
    pub fallback_hosts: Vec<String>,
    /// Stable device identifier used as the server-side account key.
    #[serde(default)]
    pub device_id: String,
    /// Signed-in user, empty for anonymous use.
    #[serde(default)]
    pub user_id: String,
    /// Bearer token sent to the backend, if signed in.
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub retry: RetrySettings,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Background sync period in seconds.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    /// Questions per day that count as reaching the daily goal.
    #[serde(default = "default_daily_goal")]
    pub daily_goal: i64,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_fallback_hosts() -> Vec<String> {
    DEFAULT_FALLBACK_HOSTS.iter().map(|h| h.to_string()).collect()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

fn default_daily_goal() -> i64 {
    ProgressionRules::default().default_daily_goal
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            server_url: default_server_url(),
            fallback_hosts: default_fallback_hosts(),
            device_id: String::new(),
            user_id: String::new(),
            auth_token: None,
            retry: RetrySettings::default(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            sync_interval_secs: default_sync_interval_secs(),
            daily_goal: default_daily_goal(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply `CERTPREP_*` environment overrides.
    ///
    /// A device id is generated when none is stored; call [`Config::save`]
    /// afterwards to persist it.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.ensure_device_id();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from environment-style lookups.
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(level) = non_empty("CERTPREP_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = non_empty("CERTPREP_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(token) = non_empty("CERTPREP_AUTH_TOKEN") {
            self.auth_token = Some(token);
        }
        if let Some(device_id) = non_empty("CERTPREP_DEVICE_ID") {
            self.device_id = device_id;
        }
    }

    /// Generate a device id if none is set. Returns true when one was created.
    pub fn ensure_device_id(&mut self) -> bool {
        if self.device_id.trim().is_empty() {
            self.device_id = uuid::Uuid::new_v4().to_string();
            true
        } else {
            false
        }
    }

    /// Write this device id into the config file if the file has none.
    ///
    /// Only the device id is added; environment overrides applied by
    /// [`Config::load`] are not persisted. Returns true when the file changed.
    pub fn persist_device_id(&self, paths: &Paths) -> CoreResult<bool> {
        let config_path = paths.config_file();
        let mut stored = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        if !stored.device_id.trim().is_empty() || self.device_id.trim().is_empty() {
            return Ok(false);
        }
        stored.device_id = self.device_id.clone();
        stored.save(paths)?;
        Ok(true)
    }

    /// Reject configurations the gateway cannot use.
    pub fn validate(&self) -> CoreResult<()> {
        self.server_url()?;
        for host in &self.fallback_hosts {
            Url::parse(host)?;
        }
        if self.retry.max_retries == 0 {
            return Err(CoreError::Config("retry.max_retries must be at least 1".to_string()));
        }
        if self.sync_interval_secs == 0 {
            return Err(CoreError::Config("sync_interval_secs must be positive".to_string()));
        }
        if self.daily_goal <= 0 {
            return Err(CoreError::Config("daily_goal must be positive".to_string()));
        }
        Ok(())
    }

    /// Get the server URL as a parsed URL.
    pub fn server_url(&self) -> CoreResult<Url> {
        Url::parse(&self.server_url).map_err(CoreError::from)
    }
}
