//! Error types for biopipe

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum DspError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid parameter: {0}")]
    InvalidParams(String),

    #[error("Unknown stage type: {0}")]
    UnknownStage(String),

    #[error("Numeric instability: {0}")]
    NumericInstability(String),

    #[error("State shape mismatch: {0}")]
    StateShapeMismatch(String),

    #[error("State corrupt: {0}")]
    StateCorrupt(String),

    #[error("Resource error: {0}")]
    Resource(String),
}

/// Result type alias
pub type DspResult<T> = Result<T, DspError>;
