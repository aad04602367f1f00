//! Scoring and classification
//!
//! Score players against the elite reference set and assign a talent tier.

pub mod classify;
pub mod scorer;

pub use classify::{Classification, TierPolicy, GRADED_TIERS, LEGACY_TIERS};
pub use scorer::{format_evaluation, round2, Evaluation, TalentScore, TalentScorer};
