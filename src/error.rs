//! Error types for kingraph.
//!
//! Two layers:
//! - [`FetchError`]: the outcome of a single failed request against the
//!   remote API. Per-node failures are recorded and skipped by the
//!   traversals, never propagated.
//! - [`KinGraphError`]: crate-level failures (bad input, config, I/O) that
//!   abort an operation.

use thiserror::Error;

/// A failed request against the remote read API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 404: the record does not exist. Never retried.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// A non-retryable HTTP status (4xx other than 404 and 429).
    #[error("HTTP {status}: {url}")]
    Status { url: String, status: u16 },

    /// The body was not JSON, or did not carry a usable record.
    #[error("undecodable response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// Transient failures (rate limit, 5xx, transport) outlasted the retry cap.
    #[error("GET failed after {attempts} attempts: {url} | last error: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

impl FetchError {
    /// `true` for misses that retrying can never fix.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, Self::Exhausted { .. })
    }
}

/// Top-level error type for kingraph operations.
#[derive(Debug, Error)]
pub enum KinGraphError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, KinGraphError>;
