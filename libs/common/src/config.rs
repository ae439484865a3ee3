//! Engine configuration types.

use serde::{Deserialize, Serialize};

use crate::types::SimulationConfig;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Monte Carlo defaults used when the caller does not override them.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Standing recomputation settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Fixed RNG seed for reproducible simulation runs. Unset in production.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Warn when a recomputed standing rests on a single pollster.
    #[serde(default = "default_true")]
    pub log_single_source: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            log_single_source: default_true(),
        }
    }
}
