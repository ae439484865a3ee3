//! A single Monte Carlo trial.

use common::SimulationCandidate;
use rand::Rng;

use crate::noise::NoiseModel;

/// Result of one trial through the whole roster.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    /// Normalized vote share per candidate, in roster order.
    pub votes: Vec<f64>,
    /// Blank/null share drawn for this trial.
    pub blank_vote: f64,
    /// Roster indices ordered by vote share, highest first. Ties keep roster
    /// order.
    pub ranking: Vec<usize>,
}

impl TrialOutcome {
    /// Roster index of the trial winner; `None` for an empty roster.
    pub fn winner(&self) -> Option<usize> {
        self.ranking.first().copied()
    }

    /// Roster indices that reach the runoff (the top two, or one for a
    /// single-candidate roster).
    pub fn runoff(&self) -> &[usize] {
        &self.ranking[..self.ranking.len().min(2)]
    }
}

/// Run one trial: draw every candidate's raw vote, draw the blank share, and
/// scale candidate votes so that votes plus blank sum to 100.
///
/// An empty roster yields an empty outcome with no winner.
pub fn run_trial<R: Rng + ?Sized>(
    candidates: &[SimulationCandidate],
    model: &NoiseModel,
    rng: &mut R,
) -> TrialOutcome {
    if candidates.is_empty() {
        return TrialOutcome {
            votes: Vec::new(),
            blank_vote: model.blank_vote(rng),
            ranking: Vec::new(),
        };
    }

    let raw: Vec<f64> = candidates
        .iter()
        .map(|c| model.raw_vote(c.average, c.trend, rng))
        .collect();

    let blank_vote = model.blank_vote(rng);
    let effective_total = 100.0 - blank_vote;
    let raw_total: f64 = raw.iter().sum();
    let scale = effective_total / raw_total;
    let votes: Vec<f64> = raw.iter().map(|v| v * scale).collect();

    let mut ranking: Vec<usize> = (0..votes.len()).collect();
    ranking.sort_by(|&a, &b| votes[b].total_cmp(&votes[a]));

    TrialOutcome {
        votes,
        blank_vote,
        ranking,
    }
}
