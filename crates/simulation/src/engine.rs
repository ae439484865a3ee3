//! Monte Carlo election simulator.
//!
//! Trials are split into fixed-size batches. The injected RNG only derives
//! one seed per batch; each batch then runs on its own `StdRng`, so a seeded
//! run produces the same report whether batches execute on one thread or
//! many. Batch tallies are merged in batch order before any percentile or
//! histogram is computed.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use common::{round2, Error, Result, SimulationCandidate, SimulationConfig, Trend};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::noise::NoiseModel;
use crate::stats::DistributionSummary;
use crate::trial::run_trial;

/// Trials per batch.
const BATCH_SIZE: u32 = 500;

/// How many runoff pairings the report lists.
const TOP_MATCHUPS: usize = 10;

/// Headline blank/null vote estimate reported with every run.
///
/// This is a fixed figure and is not derived from the per-trial blank draws
/// used for normalization; see `SimulationResult::mean_blank_vote_draw`.
pub const BLANK_VOTE_HEADLINE: f64 = 8.0;

// ── Report Types ──────────────────────────────────────────────────────

/// Per-candidate simulation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateOutcome {
    pub id: String,
    pub name: String,
    pub party: String,
    pub trend: Trend,
    /// Poll average the simulation started from.
    pub average: f64,
    /// Share of trials won, in percent.
    pub win_probability: f64,
    /// Share of trials finishing in the top two, in percent.
    pub runoff_probability: f64,
    /// Simulated vote share distribution.
    pub vote: DistributionSummary,
}

/// A top-two pairing and how often it occurred.
#[derive(Debug, Clone, Serialize)]
pub struct RunoffMatchup {
    pub candidate_a_id: String,
    pub candidate_a: String,
    pub candidate_b_id: String,
    pub candidate_b: String,
    /// Share of trials with this pairing, in percent.
    pub probability: f64,
}

/// Full report for one simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub config: SimulationConfig,
    /// Sorted by win probability, highest first.
    pub candidates: Vec<CandidateOutcome>,
    /// Most frequent pairings, highest first.
    pub runoff_matchups: Vec<RunoffMatchup>,
    /// Fixed headline estimate, see [`BLANK_VOTE_HEADLINE`].
    pub blank_vote_probability: f64,
    /// Mean of the blank/null shares actually drawn across trials.
    pub mean_blank_vote_draw: f64,
}

impl SimulationResult {
    pub fn candidate(&self, id: &str) -> Option<&CandidateOutcome> {
        self.candidates.iter().find(|c| c.id == id)
    }
}

// ── Tallies ───────────────────────────────────────────────────────────

/// Counts and samples accumulated over a batch of trials.
#[derive(Debug)]
struct Tally {
    votes: Vec<Vec<f64>>,
    wins: Vec<u32>,
    runoffs: Vec<u32>,
    /// Keyed by roster indices ordered by candidate id.
    matchups: HashMap<(usize, usize), u32>,
    blank_sum: f64,
}

impl Tally {
    fn new(candidate_count: usize, capacity: usize) -> Self {
        Self {
            votes: (0..candidate_count)
                .map(|_| Vec::with_capacity(capacity))
                .collect(),
            wins: vec![0; candidate_count],
            runoffs: vec![0; candidate_count],
            matchups: HashMap::new(),
            blank_sum: 0.0,
        }
    }

    fn run_batch(
        candidates: &[SimulationCandidate],
        model: &NoiseModel,
        seed: u64,
        trials: u32,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tally = Self::new(candidates.len(), trials as usize);

        for _ in 0..trials {
            let outcome = run_trial(candidates, model, &mut rng);

            if let Some(winner) = outcome.winner() {
                tally.wins[winner] += 1;
            }
            for &idx in outcome.runoff() {
                tally.runoffs[idx] += 1;
            }
            if let [a, b] = *outcome.runoff() {
                let key = if candidates[a].id <= candidates[b].id {
                    (a, b)
                } else {
                    (b, a)
                };
                *tally.matchups.entry(key).or_default() += 1;
            }
            tally.blank_sum += outcome.blank_vote;
            for (samples, vote) in tally.votes.iter_mut().zip(outcome.votes) {
                samples.push(vote);
            }
        }
        tally
    }

    fn merge(&mut self, other: Tally) {
        for (mine, theirs) in self.votes.iter_mut().zip(other.votes) {
            mine.extend(theirs);
        }
        for (mine, theirs) in self.wins.iter_mut().zip(other.wins) {
            *mine += theirs;
        }
        for (mine, theirs) in self.runoffs.iter_mut().zip(other.runoffs) {
            *mine += theirs;
        }
        for (key, count) in other.matchups {
            *self.matchups.entry(key).or_default() += count;
        }
        self.blank_sum += other.blank_sum;
    }
}

// ── Engine ────────────────────────────────────────────────────────────

/// Runs Monte Carlo simulations for a fixed configuration.
#[derive(Debug, Clone)]
pub struct SimulationEngine {
    config: SimulationConfig,
    force_sequential: bool,
}

impl SimulationEngine {
    /// Build an engine, rejecting an invalid config before anything runs.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            force_sequential: false,
        })
    }

    /// Run every batch on the calling thread even when the `parallel`
    /// feature is enabled. Results are identical either way.
    pub fn with_sequential(mut self, force_sequential: bool) -> Self {
        self.force_sequential = force_sequential;
        self
    }

    /// Run with a fixed seed; identical inputs give identical reports.
    pub fn run_seeded(
        &self,
        candidates: &[SimulationCandidate],
        seed: u64,
    ) -> Result<SimulationResult> {
        self.run(candidates, &mut StdRng::seed_from_u64(seed))
    }

    /// Run with an entropy-seeded RNG.
    pub fn run_from_entropy(
        &self,
        candidates: &[SimulationCandidate],
    ) -> Result<SimulationResult> {
        self.run(candidates, &mut StdRng::from_entropy())
    }

    /// Run the configured number of trials over `candidates`.
    ///
    /// Either every trial runs and a full report is returned, or an error is
    /// returned before the first trial.
    pub fn run<R: Rng + ?Sized>(
        &self,
        candidates: &[SimulationCandidate],
        rng: &mut R,
    ) -> Result<SimulationResult> {
        validate_candidates(candidates)?;
        let model = NoiseModel::new(&self.config, candidates.len())?;
        let started = Instant::now();

        let trials = self.config.trials;
        let batches: Vec<(u64, u32)> = (0..trials.div_ceil(BATCH_SIZE))
            .map(|i| {
                let size = BATCH_SIZE.min(trials - i * BATCH_SIZE);
                (rng.gen::<u64>(), size)
            })
            .collect();
        debug!(trials, batches = batches.len(), "starting simulation");

        let tallies = self.run_batches(candidates, &model, &batches);
        let mut total = Tally::new(candidates.len(), trials as usize);
        for tally in tallies {
            total.merge(tally);
        }

        let result = build_result(candidates, &self.config, total);
        info!(
            trials,
            candidates = candidates.len(),
            leader = result.candidates.first().map(|c| c.name.as_str()).unwrap_or(""),
            leader_win_pct = result.candidates.first().map(|c| c.win_probability).unwrap_or(0.0),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "simulation complete"
        );
        Ok(result)
    }

    fn run_batches(
        &self,
        candidates: &[SimulationCandidate],
        model: &NoiseModel,
        batches: &[(u64, u32)],
    ) -> Vec<Tally> {
        let run = |&(seed, size): &(u64, u32)| Tally::run_batch(candidates, model, seed, size);

        #[cfg(feature = "parallel")]
        {
            if self.force_sequential {
                batches.iter().map(run).collect()
            } else {
                batches.par_iter().map(run).collect()
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            let _ = self.force_sequential;
            batches.iter().map(run).collect()
        }
    }
}

fn validate_candidates(candidates: &[SimulationCandidate]) -> Result<()> {
    if candidates.is_empty() {
        return Err(Error::InvalidConfig("candidate roster is empty".into()));
    }

    let mut issues: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for c in candidates {
        if !seen.insert(c.id.as_str()) {
            issues.push(format!("duplicate candidate id {}", c.id));
        }
        if !c.average.is_finite() || !(0.0..=100.0).contains(&c.average) {
            issues.push(format!(
                "candidate {} average must be in [0,100], got {}",
                c.id, c.average
            ));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidConfig(issues.join("; ")))
    }
}

fn percent(count: u32, trials: u32) -> f64 {
    round2(count as f64 / trials as f64 * 100.0)
}

fn build_result(
    candidates: &[SimulationCandidate],
    config: &SimulationConfig,
    tally: Tally,
) -> SimulationResult {
    let trials = config.trials;

    let mut outcomes: Vec<CandidateOutcome> = candidates
        .iter()
        .zip(tally.votes)
        .enumerate()
        .map(|(i, (c, votes))| CandidateOutcome {
            id: c.id.clone(),
            name: c.name.clone(),
            party: c.party.clone(),
            trend: c.trend,
            average: c.average,
            win_probability: percent(tally.wins[i], trials),
            runoff_probability: percent(tally.runoffs[i], trials),
            vote: DistributionSummary::from_samples(votes).rounded(),
        })
        .collect();
    outcomes.sort_by(|a, b| b.win_probability.total_cmp(&a.win_probability));

    let mut pairs: Vec<((usize, usize), u32)> = tally.matchups.into_iter().collect();
    pairs.sort_by(|(ka, ca), (kb, cb)| {
        cb.cmp(ca).then_with(|| {
            (&candidates[ka.0].id, &candidates[ka.1].id)
                .cmp(&(&candidates[kb.0].id, &candidates[kb.1].id))
        })
    });
    let runoff_matchups = pairs
        .into_iter()
        .take(TOP_MATCHUPS)
        .map(|((a, b), count)| RunoffMatchup {
            candidate_a_id: candidates[a].id.clone(),
            candidate_a: candidates[a].name.clone(),
            candidate_b_id: candidates[b].id.clone(),
            candidate_b: candidates[b].name.clone(),
            probability: percent(count, trials),
        })
        .collect();

    SimulationResult {
        config: *config,
        candidates: outcomes,
        runoff_matchups,
        blank_vote_probability: BLANK_VOTE_HEADLINE,
        mean_blank_vote_draw: round2(tally.blank_sum / trials as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::HISTOGRAM_BUCKETS;

    fn candidate(id: &str, average: f64, trend: Trend) -> SimulationCandidate {
        SimulationCandidate {
            id: id.into(),
            name: format!("Candidate {}", id.to_uppercase()),
            party: "IND".into(),
            average,
            trend,
        }
    }

    fn field() -> Vec<SimulationCandidate> {
        vec![
            candidate("a", 31.0, Trend::Up),
            candidate("b", 27.0, Trend::Stable),
            candidate("c", 14.0, Trend::Down),
            candidate("d", 9.0, Trend::Up),
            candidate("e", 4.0, Trend::Stable),
        ]
    }

    fn config(trials: u32) -> SimulationConfig {
        SimulationConfig {
            trials,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_clear_leader_wins_quiet_race() {
        let engine = SimulationEngine::new(SimulationConfig {
            trials: 1_000,
            volatility: 0.0,
            undecided_percent: 0.0,
            turnout_variation: 0.0,
        })
        .unwrap();
        let candidates = vec![
            candidate("x", 60.0, Trend::Stable),
            candidate("y", 40.0, Trend::Stable),
        ];

        let result = engine.run_seeded(&candidates, 42).unwrap();
        let leader = result.candidate("x").unwrap();
        assert!(
            leader.win_probability > 95.0,
            "win probability {} should exceed 95%",
            leader.win_probability
        );
        assert_eq!(result.candidates[0].id, "x");
    }

    #[test]
    fn test_probability_bounds_and_runoff_dominates_win() {
        let engine = SimulationEngine::new(config(3_000)).unwrap();
        let result = engine.run_seeded(&field(), 7).unwrap();

        for c in &result.candidates {
            assert!((0.0..=100.0).contains(&c.win_probability), "{:?}", c);
            assert!((0.0..=100.0).contains(&c.runoff_probability), "{:?}", c);
            assert!(
                c.runoff_probability >= c.win_probability,
                "{}: runoff {} < win {}",
                c.id,
                c.runoff_probability,
                c.win_probability
            );
        }

        let total_win: f64 = result.candidates.iter().map(|c| c.win_probability).sum();
        assert!((total_win - 100.0).abs() < 0.1, "wins sum to {}", total_win);
        let total_runoff: f64 = result.candidates.iter().map(|c| c.runoff_probability).sum();
        assert!((total_runoff - 200.0).abs() < 0.1, "runoffs sum to {}", total_runoff);
    }

    #[test]
    fn test_histogram_counts_equal_trials() {
        let trials = 2_345; // deliberately not a multiple of the batch size
        let engine = SimulationEngine::new(config(trials)).unwrap();
        let result = engine.run_seeded(&field(), 99).unwrap();

        for c in &result.candidates {
            assert_eq!(c.vote.histogram.len(), HISTOGRAM_BUCKETS);
            assert_eq!(c.vote.histogram.iter().sum::<u32>(), trials);
            assert!(c.vote.min <= c.vote.percentile_5);
            assert!(c.vote.percentile_5 <= c.vote.median);
            assert!(c.vote.median <= c.vote.percentile_95);
            assert!(c.vote.percentile_95 <= c.vote.max);
        }
    }

    #[test]
    fn test_sorted_by_win_probability() {
        let engine = SimulationEngine::new(config(2_000)).unwrap();
        let result = engine.run_seeded(&field(), 3).unwrap();
        for pair in result.candidates.windows(2) {
            assert!(pair[0].win_probability >= pair[1].win_probability);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let engine = SimulationEngine::new(config(1_500)).unwrap();
        let first = engine.run_seeded(&field(), 1234).unwrap();
        let second = engine.run_seeded(&field(), 1234).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let engine = SimulationEngine::new(config(4_000)).unwrap();
        let parallel = engine.run_seeded(&field(), 77).unwrap();
        let sequential = engine
            .clone()
            .with_sequential(true)
            .run_seeded(&field(), 77)
            .unwrap();
        assert_eq!(
            serde_json::to_string(&parallel).unwrap(),
            serde_json::to_string(&sequential).unwrap()
        );
    }

    #[test]
    fn test_matchups_are_top_pairs() {
        let engine = SimulationEngine::new(config(3_000)).unwrap();
        let result = engine.run_seeded(&field(), 5).unwrap();

        assert!(!result.runoff_matchups.is_empty());
        assert!(result.runoff_matchups.len() <= TOP_MATCHUPS);
        for pair in result.runoff_matchups.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
        }
        for m in &result.runoff_matchups {
            assert!(m.candidate_a_id < m.candidate_b_id, "pair key must be sorted");
        }
        // Five candidates give at most ten pairings, so every trial is listed.
        let total: f64 = result.runoff_matchups.iter().map(|m| m.probability).sum();
        assert!((total - 100.0).abs() < 0.1, "matchups sum to {}", total);

        let top = &result.runoff_matchups[0];
        assert_eq!(top.candidate_a_id, "a");
        assert_eq!(top.candidate_b_id, "b");
    }

    #[test]
    fn test_single_candidate_always_wins() {
        let engine = SimulationEngine::new(config(200)).unwrap();
        let result = engine
            .run_seeded(&[candidate("solo", 45.0, Trend::Down)], 8)
            .unwrap();
        assert_eq!(result.candidates[0].win_probability, 100.0);
        assert_eq!(result.candidates[0].runoff_probability, 100.0);
        assert!(result.runoff_matchups.is_empty());
    }

    #[test]
    fn test_blank_vote_headline_is_fixed() {
        let engine = SimulationEngine::new(config(2_000)).unwrap();
        let result = engine.run_seeded(&field(), 21).unwrap();
        assert_eq!(result.blank_vote_probability, BLANK_VOTE_HEADLINE);
        assert!(
            (result.mean_blank_vote_draw - 8.0).abs() < 0.5,
            "mean blank draw {}",
            result.mean_blank_vote_draw
        );
    }

    #[test]
    fn test_invalid_inputs_rejected_before_running() {
        assert!(matches!(
            SimulationEngine::new(config(0)),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            SimulationEngine::new(config(4_000_000_000)),
            Err(Error::InvalidConfig(_))
        ));

        let engine = SimulationEngine::new(config(10)).unwrap();
        assert!(matches!(
            engine.run_seeded(&[], 1),
            Err(Error::InvalidConfig(_))
        ));

        let bad = vec![candidate("a", 120.0, Trend::Up), candidate("a", 10.0, Trend::Up)];
        let err = engine.run_seeded(&bad, 1).unwrap_err().to_string();
        assert!(err.contains("duplicate candidate id a"), "{}", err);
        assert!(err.contains("average must be in [0,100]"), "{}", err);
    }
}
