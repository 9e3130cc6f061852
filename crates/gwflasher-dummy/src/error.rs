//! Error types for the simulated programmer

use thiserror::Error;

/// Errors from parsing `dummy:` programmer options
#[derive(Debug, Error)]
pub enum DummyError {
    /// Option value could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// Option name
        key: String,
        /// Offending value
        value: String,
    },

    /// Option value parsed but is out of range
    #[error("{0}")]
    OutOfRange(String),
}

/// Result type for dummy option parsing
pub type Result<T> = std::result::Result<T, DummyError>;
