// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Symbol is empty after normalization")]
    EmptySymbol,

    #[error("Invalid job interval for {name}: {minutes} minutes")]
    InvalidInterval { name: String, minutes: i64 },

    #[error("Unknown cache domain: {0}")]
    UnknownDomain(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
