//! Unified error type for the gridform crates.
//!
//! Domain-specific failures (source parsing, schema mapping, output
//! validation) convert into [`GridformError`] so they can be handled
//! uniformly at the CLI boundary.

use thiserror::Error;

/// Unified error type for all gridform operations.
#[derive(Error, Debug)]
pub enum GridformError {
    /// I/O errors (file access etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Schema mapping errors (source column missing, unmappable value)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using GridformError.
pub type GridformResult<T> = Result<T, GridformError>;

impl From<anyhow::Error> for GridformError {
    fn from(err: anyhow::Error) -> Self {
        GridformError::Other(err.to_string())
    }
}

impl From<String> for GridformError {
    fn from(s: String) -> Self {
        GridformError::Other(s)
    }
}

impl From<&str> for GridformError {
    fn from(s: &str) -> Self {
        GridformError::Other(s.to_string())
    }
}
