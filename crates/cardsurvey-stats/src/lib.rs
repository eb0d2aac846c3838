//! CardSurvey statistics reconciliation.
//!
//! A respondent moves between three states on a card: no record, skipped,
//! or answered with one option. Every move is turned into a `StatsDelta`
//! against the survey aggregate, so storage can apply it as relative
//! increments without reading the counters first.

pub mod aggregate;
pub mod delta;

pub use aggregate::Aggregate;
pub use delta::{OptionDelta, ReconcileError, StatsDelta, UnknownOptionPolicy, compute_delta};
