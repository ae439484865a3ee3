//! Per-trial noise model.
//!
//! Every candidate's simulated vote is its poll average plus four
//! independent draws: polling error, trend momentum, a share of the
//! undecided pool, and a turnout effect. One blank/null vote share is drawn
//! per trial.

use common::{Error, Result, SimulationConfig, Trend};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Base polling margin of error in points, scaled by `volatility`.
pub const BASE_MARGIN_OF_ERROR: f64 = 2.5;

/// Simulated votes never drop below this many points.
pub const MIN_RAW_VOTE: f64 = 0.5;

/// Turnout effect sd as a fraction of `turnout_variation`.
pub const TURNOUT_SCALE: f64 = 0.5;

pub const BLANK_VOTE_MEAN: f64 = 8.0;
pub const BLANK_VOTE_STD_DEV: f64 = 3.0;
pub const MIN_BLANK_VOTE: f64 = 1.0;

/// Momentum `(mean, sd)` per trend. Rises carry further than falls.
pub fn momentum_params(trend: Trend) -> (f64, f64) {
    match trend {
        Trend::Up => (1.0, 0.5),
        Trend::Down => (-0.8, 0.5),
        Trend::Stable => (0.0, 0.3),
    }
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std_dev).map_err(|e| {
        Error::InvalidConfig(format!("bad distribution N({mean}, {std_dev}): {e}"))
    })
}

/// Distributions for one simulation run, built once and shared by every
/// trial.
#[derive(Debug, Clone)]
pub struct NoiseModel {
    polling_error: Normal<f64>,
    momentum_up: Normal<f64>,
    momentum_down: Normal<f64>,
    momentum_stable: Normal<f64>,
    turnout: Normal<f64>,
    blank_vote: Normal<f64>,
    /// Equal per-candidate slice of the undecided pool.
    undecided_share: f64,
}

impl NoiseModel {
    pub fn new(config: &SimulationConfig, candidate_count: usize) -> Result<Self> {
        if candidate_count == 0 {
            return Err(Error::InvalidConfig("candidate roster is empty".into()));
        }

        let (up_mean, up_sd) = momentum_params(Trend::Up);
        let (down_mean, down_sd) = momentum_params(Trend::Down);
        let (stable_mean, stable_sd) = momentum_params(Trend::Stable);

        Ok(Self {
            polling_error: normal(0.0, BASE_MARGIN_OF_ERROR * config.volatility)?,
            momentum_up: normal(up_mean, up_sd)?,
            momentum_down: normal(down_mean, down_sd)?,
            momentum_stable: normal(stable_mean, stable_sd)?,
            turnout: normal(0.0, config.turnout_variation * TURNOUT_SCALE)?,
            blank_vote: normal(BLANK_VOTE_MEAN, BLANK_VOTE_STD_DEV)?,
            undecided_share: config.undecided_percent / candidate_count as f64,
        })
    }

    fn momentum(&self, trend: Trend) -> &Normal<f64> {
        match trend {
            Trend::Up => &self.momentum_up,
            Trend::Down => &self.momentum_down,
            Trend::Stable => &self.momentum_stable,
        }
    }

    /// Unnormalized simulated vote for one candidate in one trial.
    ///
    /// Each candidate draws its own undecided boost; the pool is not split
    /// across candidates, so undecided mass is not conserved within a trial.
    pub fn raw_vote<R: Rng + ?Sized>(&self, average: f64, trend: Trend, rng: &mut R) -> f64 {
        let polling_error = self.polling_error.sample(rng);
        let momentum = self.momentum(trend).sample(rng);
        let undecided = self.undecided_share * (0.5 + rng.gen::<f64>());
        let turnout = self.turnout.sample(rng);

        (average + polling_error + momentum + undecided + turnout).max(MIN_RAW_VOTE)
    }

    /// Blank/null share for one trial.
    pub fn blank_vote<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.blank_vote.sample(rng).max(MIN_BLANK_VOTE)
    }
}
