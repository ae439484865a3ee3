//! Shared types, config, and error definitions for the poll engine.

pub mod config;
pub mod error;
pub mod labels;
pub mod types;

pub use config::EngineConfig;
pub use error::Error;
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Round to two decimal places, the precision every reported percentage uses.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
