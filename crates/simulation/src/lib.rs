//! Monte Carlo election simulation crate.
//!
//! Consumes candidate standings (average + trend) and estimates win,
//! runoff and vote-share distributions by repeated randomized trials.

pub mod engine;
pub mod noise;
pub mod stats;
pub mod trial;

pub use engine::{
    CandidateOutcome, RunoffMatchup, SimulationEngine, SimulationResult, BLANK_VOTE_HEADLINE,
};
pub use noise::NoiseModel;
pub use stats::{DistributionSummary, HISTOGRAM_BUCKETS};
pub use trial::{run_trial, TrialOutcome};
