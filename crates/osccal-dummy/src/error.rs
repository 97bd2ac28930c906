//! Error types for the simulated target

use thiserror::Error;

/// Errors from configuring the simulated target
#[derive(Debug, Error)]
pub enum DummyError {
    /// Unknown response behaviour
    #[error("Invalid response '{0}': must be lock, drift, silent or fail")]
    InvalidResponse(String),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for simulated target configuration
pub type Result<T> = std::result::Result<T, DummyError>;
