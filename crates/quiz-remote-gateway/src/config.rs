//! Gateway configuration.

use std::time::Duration;

use quiz_config_and_utils::{Config, RetrySettings, DEFAULT_FALLBACK_HOSTS, DEFAULT_SERVER_URL};
use url::Url;

use crate::GatewayResult;

/// Exponential backoff for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts against the active host.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_retries.max(1),
            initial_delay: Duration::from_millis(settings.initial_retry_delay_ms),
            max_delay: Duration::from_millis(settings.max_retry_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay after the zero-based `attempt` failed: `initial * 2^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Default base URL, restored after a total failure.
    pub base_url: String,
    /// Hosts tried once each after retries are exhausted.
    pub fallback_hosts: Vec<String>,
    pub retry: RetryPolicy,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub auth_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            fallback_hosts: DEFAULT_FALLBACK_HOSTS.iter().map(|h| h.to_string()).collect(),
            retry: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            auth_token: None,
        }
    }
}

impl GatewayConfig {
    pub fn from_config(config: &Config) -> GatewayResult<Self> {
        let gateway = Self {
            base_url: normalize_base_url(&config.server_url)?,
            fallback_hosts: config
                .fallback_hosts
                .iter()
                .map(|host| normalize_base_url(host))
                .collect::<GatewayResult<Vec<_>>>()?,
            retry: RetryPolicy::from(&config.retry),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
        };
        Ok(gateway)
    }
}

/// Validate a base URL and give it exactly one trailing slash.
pub fn normalize_base_url(raw: &str) -> GatewayResult<String> {
    let url = Url::parse(raw.trim())?;
    let mut normalized = url.to_string();
    while normalized.ends_with("//") {
        normalized.pop();
    }
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}
