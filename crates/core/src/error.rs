// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Persistence failure. Never swallowed: a record believed written
    /// but not written would break the freshness invariant.
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crate::port::FetchError),

    /// Refresh failed and the last-known-good record was served instead
    #[error("Refresh of {key} failed, stale data kept: {error}")]
    StaleRefresh { key: String, error: String },

    #[error("Unknown job method: {0}")]
    UnknownMethod(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the error came from an external source rather than local state
    pub fn is_fetch(&self) -> bool {
        matches!(self, AppError::Fetch(_) | AppError::StaleRefresh { .. })
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database(String)
