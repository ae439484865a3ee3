//! Recency-weighted standing computation.
//!
//! A standing is recomputed from scratch on every change to a candidate's
//! observations. There is no running state to invalidate: the result is a
//! pure function of the observations and `now`.

use chrono::{DateTime, NaiveDate, Utc};
use common::{round2, CandidateStanding, Error, Observation, Result, Trend};
use tracing::debug;

use crate::window::{
    age_in_days, recency_weight, within_lookback, LAST_WEEK_DAYS, PREVIOUS_WEEK_DAYS,
};

/// How many of the latest observations feed the stale-window fallback.
const FALLBACK_RECENT_COUNT: usize = 3;

/// Minimum week-over-week move (points) before a trend is called.
const TREND_THRESHOLD: f64 = 0.5;

/// Recompute a candidate's standing from its observations.
///
/// `observations` should hold every observation recorded for the candidate;
/// only those inside the 30-day window count unless the window is empty, in
/// which case the three most recent readings are averaged and the trend is
/// `Stable`. Values outside 0–100 are skipped. Returns
/// [`Error::InsufficientData`] when no valid observation remains.
pub fn recompute(
    candidate_id: &str,
    observations: &[Observation],
    now: DateTime<Utc>,
) -> Result<CandidateStanding> {
    let valid: Vec<Observation> = observations
        .iter()
        .filter(|o| o.has_valid_value())
        .cloned()
        .collect();
    if valid.len() < observations.len() {
        debug!(
            candidate_id,
            skipped = observations.len() - valid.len(),
            "skipping observations outside [0,100]"
        );
    }
    let observations = valid.as_slice();

    if observations.is_empty() {
        return Err(Error::InsufficientData {
            candidate_id: candidate_id.to_string(),
        });
    }

    let today = now.date_naive();
    let window = within_lookback(observations, today);

    let (average, trend) = if window.is_empty() {
        debug!(
            candidate_id,
            "no observations in look-back window, averaging latest {}", FALLBACK_RECENT_COUNT
        );
        (recent_mean(observations), Trend::Stable)
    } else {
        (weighted_average(&window, today), classify_trend(&window, today))
    };

    let standing = CandidateStanding {
        candidate_id: candidate_id.to_string(),
        average: round2(average),
        trend,
    };
    debug!(
        candidate_id,
        average = standing.average,
        trend = %standing.trend,
        window = window.len(),
        "standing recomputed"
    );
    Ok(standing)
}

/// Newest first; same-day observations keep their input order.
fn newest_first<'a>(
    observations: impl IntoIterator<Item = &'a Observation>,
) -> Vec<&'a Observation> {
    let mut sorted: Vec<&Observation> = observations.into_iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn recent_mean(observations: &[Observation]) -> f64 {
    let values: Vec<f64> = newest_first(observations)
        .into_iter()
        .take(FALLBACK_RECENT_COUNT)
        .map(|o| o.value)
        .collect();
    mean(&values)
}

fn weighted_average(window: &[&Observation], today: NaiveDate) -> f64 {
    let (weighted_sum, total_weight) = window.iter().fold((0.0, 0.0), |(sum, total), obs| {
        let weight = recency_weight(age_in_days(obs.date, today));
        (sum + obs.value * weight, total + weight)
    });

    if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        // Nothing landed in a weighted tier: use the latest raw reading.
        newest_first(window.iter().copied())
            .first()
            .map(|o| o.value)
            .unwrap_or(0.0)
    }
}

fn classify_trend(window: &[&Observation], today: NaiveDate) -> Trend {
    let mut last_week = Vec::new();
    let mut previous_week = Vec::new();
    for obs in window {
        let age = age_in_days(obs.date, today);
        if age <= LAST_WEEK_DAYS {
            last_week.push(*obs);
        } else if age <= PREVIOUS_WEEK_DAYS {
            previous_week.push(*obs);
        }
    }

    if !last_week.is_empty() && !previous_week.is_empty() {
        let recent: Vec<f64> = last_week.iter().map(|o| o.value).collect();
        let prior: Vec<f64> = previous_week.iter().map(|o| o.value).collect();
        let delta = mean(&recent) - mean(&prior);
        if delta > TREND_THRESHOLD {
            Trend::Up
        } else if delta < -TREND_THRESHOLD {
            Trend::Down
        } else {
            Trend::Stable
        }
    } else if last_week.len() >= 2 {
        let sorted = newest_first(last_week);
        let (latest, previous) = (sorted[0].value, sorted[1].value);
        if latest > previous {
            Trend::Up
        } else if latest < previous {
            Trend::Down
        } else {
            Trend::Stable
        }
    } else {
        Trend::Stable
    }
}
