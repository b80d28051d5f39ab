//! Error types for the Bilbo engine
//!
//! The numeric engine itself never fails: degenerate inputs produce sentinel
//! values. These errors only surface at the integration boundary (JSON state,
//! session entries, policy files).

use thiserror::Error;

/// Errors that can occur while loading, validating or encoding engine data
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Unknown formula: {0}")]
    UnknownFormula(String),

    #[error("Invalid policy configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid workout sample: {0}")]
    InvalidSample(#[from] ValidationError),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Reasons a logged set is rejected as implausible
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("weight must be a positive finite number, got {0}")]
    NonPositiveWeight(f64),

    #[error("repetitions must be at least 1")]
    ZeroReps,

    #[error("repetitions must not exceed {max}, got {actual}")]
    TooManyReps { max: u32, actual: u32 },

    #[error("weight {actual} kg exceeds the plausible maximum of {max} kg")]
    ImplausibleWeight { max: f64, actual: f64 },
}
