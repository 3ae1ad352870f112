//! Error types for card_sync

use tcg_common::CommonError;
use thiserror::Error;

/// Unified error type for card_sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Failed to parse a JSON document (API payload or mapping artifact)
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// HTTP error status code
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
    /// A catalog payload was well-formed JSON but unusable
    #[error("Invalid catalog data: {0}")]
    InvalidCatalog(String),
    /// Card or set does not exist in any tier
    #[error("Not found: {0}")]
    NotFound(String),
    /// Volatile cache backend failure (swallowed by the fail-open client)
    #[error("Cache error: {0}")]
    Cache(String),
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl SyncError {
    /// True when an external service could not be reached or refused to answer.
    ///
    /// Such errors degrade enrichment but are never retried internally.
    pub fn is_unavailable(&self) -> bool {
        match self {
            SyncError::Network(_) => true,
            SyncError::HttpStatus(status) => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_) | SyncError::Common(_))
            || matches!(self, SyncError::HttpStatus(s) if *s == reqwest::StatusCode::NOT_FOUND)
    }
}

/// Result alias for card_sync operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;
