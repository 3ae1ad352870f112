//! Error types for tcg_common

use thiserror::Error;

/// Errors raised while parsing catalog identifiers and dates
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommonError {
    /// Card id is neither numeric (Catalog B) nor `<set>-<number>` (Catalog A)
    #[error("Invalid card id: {0:?}")]
    InvalidCardId(String),
    /// Release date did not match the catalog's date format
    #[error("Invalid release date {value:?} (expected {expected})")]
    InvalidDate {
        value: String,
        expected: &'static str,
    },
}

/// Result alias for tcg_common operations
pub type CommonResult<T> = std::result::Result<T, CommonError>;
