//! Cricket batting talent scoring
//!
//! Derives ratio features from a player's career statistics, projects them
//! through a pre-fitted feature pipeline and scores the result by cosine
//! similarity against a reference set of elite players.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Career batting statistics for one player, as submitted for evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPlayerStats {
    /// Display name only, never used for scoring
    #[serde(default)]
    pub name: String,
    pub matches: u32,
    pub innings: u32,
    pub runs: u32,
    pub highest_score: u32,
    pub average: f64,
    pub strike_rate: f64,
    /// Career duration in years
    pub duration: f64,
    pub country: String,
    pub not_outs: u32,
    pub ducks: u32,
    pub centuries: u32,
    pub half_centuries: u32,
    pub balls_faced: u32,
}

impl RawPlayerStats {
    /// Name to show in output, falling back when none was given
    pub fn display_name(&self) -> &str {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            "Player"
        } else {
            trimmed
        }
    }

    /// Check the fields that the type system cannot rule out
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("average", self.average),
            ("strike rate", self.strike_rate),
            ("duration", self.duration),
        ] {
            if !value.is_finite() {
                return Err(TalentError::InvalidInput(format!(
                    "{} must be a finite number",
                    field
                )));
            }
            if value < 0.0 {
                return Err(TalentError::InvalidInput(format!(
                    "{} must not be negative (got {})",
                    field, value
                )));
            }
            // The pipeline computes in f32
            if value > f32::MAX as f64 {
                return Err(TalentError::InvalidInput(format!(
                    "{} is too large (got {})",
                    field, value
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for RawPlayerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} inns, {} runs)",
            self.display_name(),
            self.country,
            self.innings,
            self.runs
        )
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum TalentError {
    #[error("Scoring artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown country: {country} (artifact knows {known} countries)")]
    UnknownCountry { country: String, known: usize },

    #[error("Feature row does not match the scoring pipeline: {0}")]
    TransformMismatch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TalentError {
    /// True for errors the submitter can fix by re-entering their input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TalentError::InvalidInput(_) | TalentError::UnknownCountry { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TalentError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub artifact: ArtifactConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Remote location of the scoring artifact; only needed when the cache is empty
    pub url: Option<String>,
    pub cache_path: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        ArtifactConfig {
            url: None,
            cache_path: "/tmp/talent_model.json".to_string(),
            timeout_secs: 60,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default)]
    pub policy: predict::TierPolicy,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TalentError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| TalentError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TalentError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_stats() -> RawPlayerStats {
        RawPlayerStats {
            name: "Test Batter".to_string(),
            matches: 12,
            innings: 10,
            runs: 420,
            highest_score: 112,
            average: 52.5,
            strike_rate: 61.0,
            duration: 3.0,
            country: "India".to_string(),
            not_outs: 2,
            ducks: 1,
            centuries: 1,
            half_centuries: 1,
            balls_faced: 300,
        }
    }

    #[test]
    fn test_validate_rejects_negative_average() {
        let mut stats = sample_stats();
        stats.average = -1.0;
        let err = stats.validate().unwrap_err();
        assert!(matches!(err, TalentError::InvalidInput(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_validate_rejects_nan_strike_rate() {
        let mut stats = sample_stats();
        stats.strike_rate = f64::NAN;
        assert!(stats.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_values_beyond_f32() {
        let mut stats = sample_stats();
        stats.average = 1e39;
        let err = stats.validate().unwrap_err();
        assert!(matches!(err, TalentError::InvalidInput(_)));
        assert!(err.is_recoverable());

        let mut stats = sample_stats();
        stats.duration = f32::MAX as f64;
        assert!(stats.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_zero_innings() {
        let mut stats = sample_stats();
        stats.innings = 0;
        stats.matches = 0;
        assert!(stats.validate().is_ok());
    }

    #[test]
    fn test_display_name_fallback() {
        let mut stats = sample_stats();
        stats.name = "   ".to_string();
        assert_eq!(stats.display_name(), "Player");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.artifact.url = Some("https://example.com/model.json".to_string());
        config.classification.policy = predict::TierPolicy::Legacy;
        config.save(path).unwrap();

        let loaded = Config::load(path).unwrap();
        assert_eq!(loaded.artifact.url, config.artifact.url);
        assert_eq!(loaded.classification.policy, predict::TierPolicy::Legacy);
    }

    #[test]
    fn test_config_missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.artifact.cache_path, "/tmp/talent_model.json");
        assert_eq!(config.classification.policy, predict::TierPolicy::Graded);
    }

    #[test]
    fn test_transform_mismatch_is_not_recoverable() {
        let err = TalentError::TransformMismatch("width".to_string());
        assert!(!err.is_recoverable());
    }
}
