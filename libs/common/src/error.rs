//! Unified error type for the poll engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Simulation inputs rejected before any trial runs.
    #[error("Invalid simulation config: {0}")]
    InvalidConfig(String),

    /// A standing was requested for a candidate with no observations at all.
    #[error("Insufficient data: no observations recorded for candidate {candidate_id}")]
    InsufficientData { candidate_id: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
