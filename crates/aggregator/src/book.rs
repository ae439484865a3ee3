//! Standing book: the stored standings plus the seams to observation storage
//! and the candidate roster.
//!
//! Standings live in a `DashMap` keyed by candidate id. Recomputing a
//! candidate holds that candidate's entry for the duration of the compute and
//! the write, so concurrent refreshes of the same candidate are serialized
//! while different candidates proceed independently.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::config::AggregationConfig;
use common::{
    Candidate, CandidateStanding, Error, Observation, Result, SimulationCandidate, SourceProfile,
};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::sources::analyze;
use crate::standing::recompute;

// ── Collaborator Seams ────────────────────────────────────────────────

/// Read access to recorded poll observations.
pub trait ObservationStore: Send + Sync {
    /// Every observation recorded for the candidate, in any order.
    fn observations_for(&self, candidate_id: &str) -> Vec<Observation>;
}

/// The set of registered candidates.
pub trait CandidateRoster: Send + Sync {
    fn candidates(&self) -> Vec<Candidate>;
}

/// Append-only in-memory observation store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryObservationStore {
    by_candidate: Arc<DashMap<String, Vec<Observation>>>,
}

impl InMemoryObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation. A value outside 0–100 (or non-finite) is
    /// rejected, and a repeat of an existing `(candidate_id, date, pollster)`
    /// reading is ignored; both return `false`.
    pub fn record(&self, observation: Observation) -> bool {
        if !observation.has_valid_value() {
            warn!(
                candidate_id = %observation.candidate_id,
                date = %observation.date,
                pollster = %observation.pollster,
                value = observation.value,
                "observation value outside [0,100] rejected"
            );
            return false;
        }

        let mut rows = self
            .by_candidate
            .entry(observation.candidate_id.clone())
            .or_default();
        let duplicate = rows
            .iter()
            .any(|o| o.date == observation.date && o.pollster == observation.pollster);
        if duplicate {
            debug!(
                candidate_id = %observation.candidate_id,
                date = %observation.date,
                pollster = %observation.pollster,
                "duplicate observation ignored"
            );
            return false;
        }
        rows.push(observation);
        true
    }

    /// Candidate ids with at least one observation, sorted.
    pub fn candidate_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.by_candidate.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl FromIterator<Observation> for InMemoryObservationStore {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        let store = Self::new();
        for observation in iter {
            store.record(observation);
        }
        store
    }
}

impl ObservationStore for InMemoryObservationStore {
    fn observations_for(&self, candidate_id: &str) -> Vec<Observation> {
        self.by_candidate
            .get(candidate_id)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }
}

/// A fixed roster passed in by the host.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster(pub Vec<Candidate>);

impl CandidateRoster for StaticRoster {
    fn candidates(&self) -> Vec<Candidate> {
        self.0.clone()
    }
}

// ── Standing Book ─────────────────────────────────────────────────────

/// Thread-safe standings keyed by candidate id.
pub type StandingMap = Arc<DashMap<String, CandidateStanding>>;

/// Outcome of refreshing a whole roster.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshSummary {
    pub updated: Vec<CandidateStanding>,
    /// Candidates left untouched because they have no observations.
    pub insufficient: Vec<String>,
}

/// Owns the derived standings and recomputes them on demand.
#[derive(Debug, Clone)]
pub struct StandingBook {
    standings: StandingMap,
    config: AggregationConfig,
}

impl Default for StandingBook {
    fn default() -> Self {
        Self::new(AggregationConfig::default())
    }
}

impl StandingBook {
    pub fn new(config: AggregationConfig) -> Self {
        Self {
            standings: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Current stored standing for a candidate.
    pub fn standing(&self, candidate_id: &str) -> Option<CandidateStanding> {
        self.standings.get(candidate_id).map(|s| s.clone())
    }

    /// Recompute and store a candidate's standing from the given snapshot.
    ///
    /// On [`Error::InsufficientData`] the previously stored standing is left
    /// as it was and the error is returned.
    pub fn recompute_standing(
        &self,
        candidate_id: &str,
        observations: &[Observation],
        now: DateTime<Utc>,
    ) -> Result<CandidateStanding> {
        let entry = self.standings.entry(candidate_id.to_string());
        let standing = match recompute(candidate_id, observations, now) {
            Ok(s) => s,
            Err(e) => {
                warn!(candidate_id, "standing not updated: {}", e);
                return Err(e);
            }
        };

        entry.insert(standing.clone());
        Ok(standing)
    }

    /// Source-diversity profile for a candidate's current window.
    pub fn source_profile(
        &self,
        observations: &[Observation],
        now: DateTime<Utc>,
    ) -> SourceProfile {
        analyze(observations, now)
    }

    /// Pull a fresh snapshot from the store, recompute the standing, and
    /// profile its sources.
    pub fn refresh<S: ObservationStore + ?Sized>(
        &self,
        candidate_id: &str,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<(CandidateStanding, SourceProfile)> {
        let observations = store.observations_for(candidate_id);
        let standing = self.recompute_standing(candidate_id, &observations, now)?;
        let profile = self.source_profile(&observations, now);

        if self.config.log_single_source && profile.is_single_source {
            warn!(
                candidate_id,
                source = profile.source_name.as_deref().unwrap_or("none"),
                average = standing.average,
                "standing rests on a single pollster"
            );
        }
        Ok((standing, profile))
    }

    /// Refresh every roster candidate. Candidates without observations keep
    /// their previous standing and are listed in the summary.
    pub fn refresh_all<S, R>(&self, store: &S, roster: &R, now: DateTime<Utc>) -> RefreshSummary
    where
        S: ObservationStore + ?Sized,
        R: CandidateRoster + ?Sized,
    {
        let mut summary = RefreshSummary::default();
        for candidate in roster.candidates() {
            match self.refresh(&candidate.id, store, now) {
                Ok((standing, _)) => summary.updated.push(standing),
                Err(Error::InsufficientData { candidate_id }) => {
                    summary.insufficient.push(candidate_id)
                }
                Err(e) => warn!(candidate_id = %candidate.id, "refresh failed: {}", e),
            }
        }
        info!(
            updated = summary.updated.len(),
            insufficient = summary.insufficient.len(),
            "roster standings refreshed"
        );
        summary
    }

    /// Snapshot of the roster with current standings attached, ready for the
    /// simulator. Candidates that have never had a standing are skipped.
    pub fn simulation_roster<R: CandidateRoster + ?Sized>(
        &self,
        roster: &R,
    ) -> Vec<SimulationCandidate> {
        let mut seen = HashSet::new();
        roster
            .candidates()
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .filter_map(|candidate| match self.standing(&candidate.id) {
                Some(standing) => Some(SimulationCandidate::from_standing(&candidate, &standing)),
                None => {
                    warn!(candidate_id = %candidate.id, "no standing yet, left out of simulation");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use common::Trend;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn obs(candidate: &str, days_ago: i64, value: f64, pollster: &str) -> Observation {
        let date = now().date_naive() - Duration::days(days_ago);
        Observation::new(candidate, date, value, pollster)
    }

    fn roster() -> StaticRoster {
        StaticRoster(vec![
            Candidate {
                id: "a".into(),
                name: "Alice".into(),
                party: "P1".into(),
            },
            Candidate {
                id: "b".into(),
                name: "Bruno".into(),
                party: "P2".into(),
            },
        ])
    }

    #[test]
    fn test_insufficient_data_leaves_prior_standing() {
        let book = StandingBook::default();
        let first = book
            .recompute_standing("a", &[obs("a", 1, 30.0, "Ipsos")], now())
            .unwrap();

        let err = book.recompute_standing("a", &[], now()).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
        assert_eq!(book.standing("a"), Some(first));
    }

    #[test]
    fn test_insufficient_data_never_writes_zero() {
        let book = StandingBook::default();
        assert!(book.recompute_standing("ghost", &[], now()).is_err());
        assert_eq!(book.standing("ghost"), None);
    }

    #[test]
    fn test_store_ignores_duplicate_readings() {
        let store = InMemoryObservationStore::new();
        assert!(store.record(obs("a", 1, 30.0, "Ipsos")));
        assert!(!store.record(obs("a", 1, 31.0, "Ipsos")));
        assert!(store.record(obs("a", 1, 29.0, "Datum")));
        assert_eq!(store.observations_for("a").len(), 2);
        assert!(store.observations_for("zzz").is_empty());
    }

    #[test]
    fn test_refresh_all_and_simulation_roster() {
        let store: InMemoryObservationStore = vec![
            obs("a", 0, 40.0, "Ipsos"),
            obs("a", 9, 38.0, "Datum"),
        ]
        .into_iter()
        .collect();
        let book = StandingBook::default();

        let summary = book.refresh_all(&store, &roster(), now());
        assert_eq!(summary.updated.len(), 1);
        assert_eq!(summary.insufficient, vec!["b".to_string()]);

        let sim = book.simulation_roster(&roster());
        assert_eq!(sim.len(), 1);
        assert_eq!(sim[0].name, "Alice");
        assert_eq!(sim[0].trend, Trend::Up);
    }

    #[test]
    fn test_refresh_reports_source_profile() {
        let store: InMemoryObservationStore = vec![
            obs("a", 0, 40.0, "Ipsos (estimated)"),
            obs("a", 3, 39.0, "Ipsos"),
        ]
        .into_iter()
        .collect();
        let book = StandingBook::default();
        let (_, profile) = book.refresh("a", &store, now()).unwrap();
        assert!(profile.is_single_source);
        assert_eq!(profile.source_name.as_deref(), Some("Ipsos"));
    }

    #[test]
    fn test_concurrent_recompute_same_candidate() {
        let book = StandingBook::default();
        let snapshot = vec![obs("a", 0, 30.0, "Ipsos"), obs("a", 10, 20.0, "Datum")];
        let expected = recompute("a", &snapshot, now()).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let book = book.clone();
                let snapshot = snapshot.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        book.recompute_standing("a", &snapshot, now()).unwrap();
                    }
                });
            }
        });

        assert_eq!(book.standing("a"), Some(expected));
    }

    #[test]
    fn test_store_rejects_out_of_range_values() {
        let store = InMemoryObservationStore::new();
        assert!(!store.record(obs("a", 0, f64::NAN, "Ipsos")));
        assert!(!store.record(obs("a", 0, 140.0, "Datum")));
        assert!(!store.record(obs("a", 0, -0.5, "Quaest")));
        assert!(store.record(obs("a", 0, 100.0, "Ipsos")));
        assert_eq!(store.observations_for("a").len(), 1);

        let empty: InMemoryObservationStore = vec![obs("b", 0, f64::INFINITY, "X")]
            .into_iter()
            .collect();
        assert!(empty.candidate_ids().is_empty());
    }
}
