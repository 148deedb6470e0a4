//! Error types for the Breakwater service.

use thiserror::Error;

/// Main error type for Breakwater operations.
#[derive(Error, Debug)]
pub enum BreakwaterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limiting errors
    #[error("Rate limit error: {0}")]
    RateLimit(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Breakwater operations.
pub type Result<T> = std::result::Result<T, BreakwaterError>;
