//! Sync results.

use quiz_database::DatabaseError;
use quiz_remote_gateway::GatewayError;
use thiserror::Error;

/// Why a sync operation failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    #[error("Server not healthy")]
    ServerUnhealthy,

    #[error("Server not reachable")]
    NotReachable(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Server error: HTTP {0}")]
    ServerError(u16),

    #[error("Request failed: HTTP {status}: {message}")]
    ClientError { status: u16, message: String },

    /// The server answered but reported `success: false`.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    #[error("Local store error: {0}")]
    LocalStore(String),
}

impl From<GatewayError> for SyncFailure {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Dns(msg) | GatewayError::ConnectionRefused(msg) => Self::NotReachable(msg),
            GatewayError::Timeout(_) => Self::Timeout,
            GatewayError::Network(msg) => Self::NetworkError(msg),
            GatewayError::Server { status, .. } => Self::ServerError(status),
            GatewayError::Client { status, message } => Self::ClientError { status, message },
            GatewayError::Rejected(msg) => Self::Rejected(msg),
            GatewayError::Decode(msg) => Self::InvalidResponse(msg),
            other @ (GatewayError::InvalidUrl(_) | GatewayError::Setup(_)) => Self::NetworkError(other.to_string()),
        }
    }
}

impl From<DatabaseError> for SyncFailure {
    fn from(err: DatabaseError) -> Self {
        Self::LocalStore(err.to_string())
    }
}

/// Result of one sync operation. Sync never returns `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success(String),
    Failure(SyncFailure),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Human-readable message for either variant.
    pub fn message(&self) -> String {
        match self {
            Self::Success(message) => message.clone(),
            Self::Failure(failure) => failure.to_string(),
        }
    }
}

impl From<Result<String, SyncFailure>> for SyncOutcome {
    fn from(result: Result<String, SyncFailure>) -> Self {
        match result {
            Ok(message) => Self::Success(message),
            Err(failure) => Self::Failure(failure),
        }
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success(message) => write!(f, "{}", message),
            Self::Failure(failure) => write!(f, "Sync failed: {}", failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_mapping() {
        assert_eq!(
            SyncFailure::from(GatewayError::Dns("lookup".into())),
            SyncFailure::NotReachable("lookup".into())
        );
        assert_eq!(SyncFailure::from(GatewayError::Timeout("t".into())), SyncFailure::Timeout);
        assert_eq!(
            SyncFailure::from(GatewayError::Server { status: 503, body: String::new() }),
            SyncFailure::ServerError(503)
        );
        assert_eq!(
            SyncFailure::from(GatewayError::Rejected("no".into())).to_string(),
            "Rejected by server: no"
        );
    }

    #[test]
    fn test_outcome_message() {
        let ok: SyncOutcome = Ok::<_, SyncFailure>("Data uploaded successfully".to_string()).into();
        assert!(ok.is_success());
        assert_eq!(ok.message(), "Data uploaded successfully");

        let failed = SyncOutcome::Failure(SyncFailure::ServerUnhealthy);
        assert!(!failed.is_success());
        assert_eq!(failed.message(), "Server not healthy");
        assert_eq!(failed.to_string(), "Sync failed: Server not healthy");
    }
}
