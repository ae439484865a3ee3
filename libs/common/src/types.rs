//! Domain types shared across the engine.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::labels::parse_trend;

// ── Observation Types ─────────────────────────────────────────────────

/// A single dated poll reading for one candidate from one pollster.
///
/// Observations are append-only. The engine reads them but never mutates
/// or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub candidate_id: String,
    /// Field date of the poll.
    pub date: NaiveDate,
    /// Vote intention, 0–100.
    pub value: f64,
    /// Pollster name as recorded, possibly annotated (e.g. "Ipsos (estimated)").
    #[serde(default)]
    pub pollster: String,
}

impl Observation {
    pub fn new(
        candidate_id: impl Into<String>,
        date: NaiveDate,
        value: f64,
        pollster: impl Into<String>,
    ) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            date,
            value,
            pollster: pollster.into(),
        }
    }

    /// Whether `value` is a usable percentage: finite and within 0–100.
    pub fn has_valid_value(&self) -> bool {
        self.value.is_finite() && (0.0..=100.0).contains(&self.value)
    }
}

// ── Standing Types ────────────────────────────────────────────────────

/// Short-term momentum label for a candidate.
///
/// Serializes as `up`/`down`/`stable`; deserializes any label
/// [`parse_trend`] recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_trend(s).ok_or_else(|| Error::Other(format!("unrecognized trend label: {s:?}")))
    }
}

impl TryFrom<String> for Trend {
    type Error = Error;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        label.parse()
    }
}

/// Recency-weighted standing for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStanding {
    pub candidate_id: String,
    /// Weighted poll average, rounded to two decimals.
    pub average: f64,
    pub trend: Trend,
}

/// Whether a standing rests on one pollster or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub is_single_source: bool,
    /// The only pollster in the window, when there is exactly one.
    pub source_name: Option<String>,
    pub source_count: usize,
    /// Distinct normalized pollster names, sorted.
    pub pollster_names: Vec<String>,
}

// ── Roster Types ──────────────────────────────────────────────────────

/// A registered candidate, without any poll numbers attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub party: String,
}

/// A candidate as the simulator sees it: identity plus current standing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationCandidate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub party: String,
    pub average: f64,
    #[serde(default)]
    pub trend: Trend,
}

impl SimulationCandidate {
    pub fn from_standing(candidate: &Candidate, standing: &CandidateStanding) -> Self {
        Self {
            id: candidate.id.clone(),
            name: candidate.name.clone(),
            party: candidate.party.clone(),
            average: standing.average,
            trend: standing.trend,
        }
    }
}

// ── Simulation Config ─────────────────────────────────────────────────

/// Knobs for one Monte Carlo run. Immutable per run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of independent trials.
    #[serde(default = "default_trials")]
    pub trials: u32,

    /// Scales the base polling margin of error, 0–1.
    #[serde(default = "default_volatility")]
    pub volatility: f64,

    /// Share of voters still undecided, 0–100.
    #[serde(default = "default_undecided")]
    pub undecided_percent: f64,

    /// Turnout swing in points, >= 0.
    #[serde(default = "default_turnout_variation")]
    pub turnout_variation: f64,
}

/// Upper bound on trials per run; every vote sample is kept in memory.
pub const MAX_TRIALS: u32 = 1_000_000;

fn default_trials() -> u32 {
    10_000
}
fn default_volatility() -> f64 {
    0.5
}
fn default_undecided() -> f64 {
    15.0
}
fn default_turnout_variation() -> f64 {
    5.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            volatility: default_volatility(),
            undecided_percent: default_undecided(),
            turnout_variation: default_turnout_variation(),
        }
    }
}

impl SimulationConfig {
    /// Reject out-of-range knobs, reporting every problem at once.
    pub fn validate(&self) -> Result<(), Error> {
        let mut issues: Vec<String> = Vec::new();

        if self.trials == 0 {
            issues.push("trials must be > 0".into());
        } else if self.trials > MAX_TRIALS {
            issues.push(format!("trials must be <= {}, got {}", MAX_TRIALS, self.trials));
        }
        if !self.volatility.is_finite() || !(0.0..=1.0).contains(&self.volatility) {
            issues.push(format!("volatility must be in [0,1], got {}", self.volatility));
        }
        if !self.undecided_percent.is_finite() || !(0.0..=100.0).contains(&self.undecided_percent)
        {
            issues.push(format!(
                "undecided_percent must be in [0,100], got {}",
                self.undecided_percent
            ));
        }
        if !self.turnout_variation.is_finite() || self.turnout_variation < 0.0 {
            issues.push(format!(
                "turnout_variation must be >= 0, got {}",
                self.turnout_variation
            ));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfig(issues.join("; ")))
        }
    }
}
