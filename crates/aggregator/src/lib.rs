//! Poll aggregation crate.
//!
//! Turns a candidate's dated poll observations into a recency-weighted
//! standing and a source-diversity profile, and keeps the current standings
//! for the whole roster.

pub mod book;
pub mod sources;
pub mod standing;
pub mod window;

pub use book::{
    CandidateRoster, InMemoryObservationStore, ObservationStore, RefreshSummary, StandingBook,
    StandingMap, StaticRoster,
};
pub use sources::analyze;
pub use standing::recompute;
