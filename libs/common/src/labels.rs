//! Canonicalization of free-text labels.
//!
//! Pollster names arrive with annotations such as `"Ipsos (estimated)"` and
//! trend labels arrive in whatever wording the upstream feed used. Both the
//! aggregator and the simulator work on the canonical forms produced here.

use crate::types::Trend;

/// Parenthetical suffixes that mark a reading as estimated rather than a
/// distinct source. Compared lowercase.
const ESTIMATE_MARKERS: &[&str] = &[
    "estimated",
    "estimate",
    "est",
    "est.",
    "estimativa",
    "estimado",
    "projected",
    "projection",
    "projeção",
    "projecao",
];

/// Normalize a pollster name for source counting.
///
/// Trims, collapses runs of whitespace and strips trailing estimate-style
/// annotations. Other parentheticals (`"Datafolha (SP)"`) are part of the name.
pub fn normalize_pollster(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut name = collapsed.as_str();
    while let Some(stripped) = strip_estimate_annotation(name) {
        name = stripped;
    }
    name.to_string()
}

fn strip_estimate_annotation(name: &str) -> Option<&str> {
    let trimmed = name.trim_end();
    let body = trimmed.strip_suffix(')')?;
    let open = body.rfind('(')?;
    let marker = body[open + 1..].trim().to_lowercase();
    if ESTIMATE_MARKERS.contains(&marker.as_str()) {
        Some(body[..open].trim_end())
    } else {
        None
    }
}

/// Map a free-text trend label onto [`Trend`]. Returns `None` when the label
/// is not recognized.
pub fn parse_trend(raw: &str) -> Option<Trend> {
    let label = raw.trim().to_lowercase();
    match label.as_str() {
        "up" | "rising" | "increase" | "increasing" | "alta" | "subindo" | "subiu" | "↑"
        | "+" => Some(Trend::Up),
        "down" | "falling" | "decrease" | "decreasing" | "queda" | "caindo" | "caiu" | "↓"
        | "-" => Some(Trend::Down),
        "stable" | "steady" | "flat" | "estável" | "estavel" | "estabilidade" | "=" | "→" => {
            Some(Trend::Stable)
        }
        _ => None,
    }
}
