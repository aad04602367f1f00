//! Talent tiers
//!
//! A score maps to a tier through an ordered threshold table: the first
//! threshold the score reaches wins, anything below all of them is
//! `NotCloseYet`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Talent tier, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Not Close Yet")]
    NotCloseYet,
    #[serde(rename = "Needs Development")]
    NeedsDevelopment,
    #[serde(rename = "Promising Talent")]
    PromisingTalent,
    #[serde(rename = "Future Top Player")]
    FutureTopPlayer,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::NotCloseYet => "Not Close Yet",
            Classification::NeedsDevelopment => "Needs Development",
            Classification::PromisingTalent => "Promising Talent",
            Classification::FutureTopPlayer => "Future Top Player",
        }
    }

    /// Position in the tier order, 0 being the lowest
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Thresholds in descending order with the tier each one unlocks
pub type TierTable = &'static [(f64, Classification)];

/// Four tiers with a real band between 50 and 65
pub const GRADED_TIERS: TierTable = &[
    (65.0, Classification::FutureTopPlayer),
    (50.0, Classification::PromisingTalent),
    (35.0, Classification::NeedsDevelopment),
];

/// Observed three-tier behaviour: everything from 50 up is a future top player
pub const LEGACY_TIERS: TierTable = &[
    (50.0, Classification::FutureTopPlayer),
    (35.0, Classification::NeedsDevelopment),
];

/// Which tier table to classify with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierPolicy {
    #[default]
    Graded,
    Legacy,
}

impl TierPolicy {
    pub fn tiers(&self) -> TierTable {
        match self {
            TierPolicy::Graded => GRADED_TIERS,
            TierPolicy::Legacy => LEGACY_TIERS,
        }
    }

    pub fn classify(&self, score: f64) -> Classification {
        self.tiers()
            .iter()
            .find(|(threshold, _)| score >= *threshold)
            .map(|(_, tier)| *tier)
            .unwrap_or(Classification::NotCloseYet)
    }
}

impl fmt::Display for TierPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierPolicy::Graded => write!(f, "graded"),
            TierPolicy::Legacy => write!(f, "legacy"),
        }
    }
}

impl std::str::FromStr for TierPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "graded" => Ok(TierPolicy::Graded),
            "legacy" => Ok(TierPolicy::Legacy),
            _ => Err(format!("Unknown policy: {}. Use graded or legacy.", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graded_boundaries() {
        let policy = TierPolicy::Graded;
        assert_eq!(policy.classify(100.0), Classification::FutureTopPlayer);
        assert_eq!(policy.classify(65.0), Classification::FutureTopPlayer);
        assert_eq!(policy.classify(64.99), Classification::PromisingTalent);
        assert_eq!(policy.classify(50.0), Classification::PromisingTalent);
        assert_eq!(policy.classify(49.99), Classification::NeedsDevelopment);
        assert_eq!(policy.classify(35.0), Classification::NeedsDevelopment);
        assert_eq!(policy.classify(34.99), Classification::NotCloseYet);
        assert_eq!(policy.classify(0.0), Classification::NotCloseYet);
    }

    #[test]
    fn test_legacy_boundaries() {
        let policy = TierPolicy::Legacy;
        assert_eq!(policy.classify(50.0), Classification::FutureTopPlayer);
        assert_eq!(policy.classify(49.99), Classification::NeedsDevelopment);
        assert_eq!(policy.classify(35.0), Classification::NeedsDevelopment);
        assert_eq!(policy.classify(34.99), Classification::NotCloseYet);
    }

    #[test]
    fn test_legacy_never_yields_promising() {
        let policy = TierPolicy::Legacy;
        for step in 0..=10_000 {
            let score = step as f64 / 100.0;
            assert_ne!(policy.classify(score), Classification::PromisingTalent);
        }
    }

    #[test]
    fn test_classification_is_monotonic() {
        for policy in [TierPolicy::Graded, TierPolicy::Legacy] {
            let mut previous = policy.classify(0.0);
            for step in 1..=10_000 {
                let current = policy.classify(step as f64 / 100.0);
                assert!(
                    current.rank() >= previous.rank(),
                    "{} dropped from {} to {} at {}",
                    policy,
                    previous,
                    current,
                    step as f64 / 100.0
                );
                previous = current;
            }
        }
    }

    #[test]
    fn test_tables_are_descending() {
        for policy in [TierPolicy::Graded, TierPolicy::Legacy] {
            let tiers = policy.tiers();
            for pair in tiers.windows(2) {
                assert!(pair[0].0 > pair[1].0);
                assert!(pair[0].1 > pair[1].1);
            }
        }
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Legacy".parse::<TierPolicy>().unwrap(), TierPolicy::Legacy);
        assert_eq!("graded".parse::<TierPolicy>().unwrap(), TierPolicy::Graded);
        assert!("strict".parse::<TierPolicy>().is_err());
    }

    #[test]
    fn test_label_serialization() {
        let json = serde_json::to_string(&Classification::NeedsDevelopment).unwrap();
        assert_eq!(json, "\"Needs Development\"");
    }
}
