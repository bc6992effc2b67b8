//! HTTP access to the quiz backend.
//!
//! Requests go to the active base URL with exponential backoff on
//! transient failures, then rotate once through the fallback hosts.
//! The sync engine talks to the backend through [`SyncApi`].

mod api;
mod client;
mod config;
mod dto;
mod error;
mod router;

pub use api::SyncApi;
pub use client::{RemoteGateway, DEFAULT_SESSION_LIMIT};
pub use config::{normalize_base_url, GatewayConfig, RetryPolicy};
pub use dto::*;
pub use error::{GatewayError, GatewayResult};
pub use router::BaseUrlRouter;
