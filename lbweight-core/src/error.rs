//! Error types for lbweight
//!
//! Provides a unified error type for document handling and rebalancing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lbweight operations
pub type Result<T> = std::result::Result<T, LbWeightError>;

/// Unified error type for lbweight
#[derive(Error, Debug)]
pub enum LbWeightError {
    // ===== Document Errors =====
    #[error("Failed to read document {path:?}: {source}")]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse document: {0}")]
    Parse(String),

    #[error("Required field not found: {field}")]
    MissingField { field: String },

    #[error("Invalid weight value: {value:?}")]
    InvalidWeight { value: String },

    // ===== I/O Errors =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Serialization Errors =====
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LbWeightError {
    /// Shorthand for a required field that the tree search did not find
    pub fn missing(field: impl Into<String>) -> Self {
        LbWeightError::MissingField {
            field: field.into(),
        }
    }
}

impl From<yaml_rust2::scanner::ScanError> for LbWeightError {
    fn from(err: yaml_rust2::scanner::ScanError) -> Self {
        LbWeightError::Parse(err.to_string())
    }
}
