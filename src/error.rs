//! Error types for the chat client and the polling monitor.

use thiserror::Error;

/// Result type for chat server operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Failure of a single event fetch. Recoverable: the monitor reports it for
/// the tick and carries on unless configured to stop on failure.
pub type FetchError = ApiError;

/// Errors raised by requests against the chat server.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network error (connection refused, timeout, TLS, proxy)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Session missing, expired or rejected by the server (401/403)
    #[error("not authenticated: {0}")]
    Unauthorized(String),

    /// Any other non-2xx response
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded (JSON, base64, system payload)
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Rejected locally before any request was made
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Invalid configuration. Always raised before a monitor starts ticking.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid poll interval: {0}")]
    InvalidInterval(String),

    #[error("invalid overlap multiplier: {0}")]
    InvalidMultiplier(String),

    #[error(
        "dedup horizon must be between 1 and {} rounds",
        crate::monitor::config::MAX_DEDUP_HORIZON
    )]
    InvalidHorizon,

    #[error("invalid server url {0:?}: must include the scheme (http:// or https://)")]
    InvalidServer(String),

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("failed to load config: {0}")]
    Load(String),
}
