//! Observation look-back window and recency tiers.

use chrono::NaiveDate;
use common::Observation;

/// Observations older than this (in days) never drive a standing.
pub const LOOKBACK_DAYS: i64 = 30;

/// Upper age bound (inclusive, days) of the "last week" trend bucket.
pub const LAST_WEEK_DAYS: i64 = 7;

/// Upper age bound (inclusive, days) of the "previous week" trend bucket.
pub const PREVIOUS_WEEK_DAYS: i64 = 14;

/// Recency tiers as `(max_age_days, weight)`, youngest first.
pub const WEIGHT_TIERS: &[(i64, f64)] = &[
    (LAST_WEEK_DAYS, 0.5),
    (PREVIOUS_WEEK_DAYS, 0.3),
    (LOOKBACK_DAYS, 0.2),
];

/// Calendar-day age of an observation. Today is age 0; future-dated
/// observations also count as age 0.
pub fn age_in_days(date: NaiveDate, today: NaiveDate) -> i64 {
    (today - date).num_days().max(0)
}

/// Weight for an observation of the given age; zero outside every tier.
pub fn recency_weight(age_days: i64) -> f64 {
    WEIGHT_TIERS
        .iter()
        .find(|(max_age, _)| age_days <= *max_age)
        .map(|(_, weight)| *weight)
        .unwrap_or(0.0)
}

/// Observations dated within the look-back horizon, in input order.
pub fn within_lookback(observations: &[Observation], today: NaiveDate) -> Vec<&Observation> {
    observations
        .iter()
        .filter(|o| age_in_days(o.date, today) <= LOOKBACK_DAYS)
        .collect()
}
