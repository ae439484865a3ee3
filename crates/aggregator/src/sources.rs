//! Source-diversity analysis for the look-back window.
//!
//! Flags standings that rest on a single pollster so consumers can show them
//! as lower confidence. Has no effect on the weighted average itself.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::labels::normalize_pollster;
use common::{Observation, SourceProfile};

use crate::window::within_lookback;

/// Profile the distinct pollsters behind a candidate's current window.
pub fn analyze(observations: &[Observation], now: DateTime<Utc>) -> SourceProfile {
    let names: BTreeSet<String> = within_lookback(observations, now.date_naive())
        .into_iter()
        .map(|o| normalize_pollster(&o.pollster))
        .filter(|name| !name.is_empty())
        .collect();

    let source_count = names.len();
    let source_name = if source_count == 1 {
        names.iter().next().cloned()
    } else {
        None
    };

    SourceProfile {
        is_single_source: source_count <= 1,
        source_name,
        source_count,
        pollster_names: names.into_iter().collect(),
    }
}
