//! Gateway error types.

use std::error::Error as StdError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Host lookup failed: {0}")]
    Dns(String),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Network error: {0}")]
    Network(String),

    /// 5xx response.
    #[error("Server error: HTTP {status}")]
    Server { status: u16, body: String },

    /// 4xx response. Never retried.
    #[error("Client error: HTTP {status}: {message}")]
    Client { status: u16, message: String },

    /// 2xx response whose envelope reported `success: false`.
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl GatewayError {
    /// Transient failures worth another attempt: 5xx, timeouts, DNS
    /// failures and refused connections.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Dns(_) | Self::ConnectionRefused(_) | Self::Server { .. }
        )
    }

    /// Whether another host might succeed where this one failed.
    pub fn should_try_fallback(&self) -> bool {
        self.is_retryable() || matches!(self, Self::Network(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        let message = describe(&err);
        if err.is_timeout() {
            return Self::Timeout(message);
        }
        if err.is_decode() {
            return Self::Decode(message);
        }
        if err.is_builder() {
            return Self::Setup(message);
        }
        if err.is_connect() {
            if source_chain_matches(&err, |e| {
                e.downcast_ref::<std::io::Error>()
                    .map(|io| io.kind() == std::io::ErrorKind::ConnectionRefused)
                    .unwrap_or(false)
            }) {
                return Self::ConnectionRefused(message);
            }
            if is_dns_failure(&message) {
                return Self::Dns(message);
            }
            if message.to_lowercase().contains("timed out") {
                return Self::Timeout(message);
            }
        }
        if let Some(status) = err.status() {
            let code = status.as_u16();
            if status.is_server_error() {
                return Self::Server { status: code, body: String::new() };
            }
            if status.is_client_error() {
                return Self::Client { status: code, message };
            }
        }
        Self::Network(message)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Flatten an error and its sources into one line.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}

fn source_chain_matches(
    err: &(dyn StdError + 'static),
    pred: impl Fn(&(dyn StdError + 'static)) -> bool,
) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if pred(e) {
            return true;
        }
        current = e.source();
    }
    false
}

fn is_dns_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
}
