//! Derived ratio features and the single-row feature table
//!
//! Every ratio falls back to 0 when its denominator is 0, so any combination
//! of counting statistics yields a valid row.

use serde::{Deserialize, Serialize};

use crate::RawPlayerStats;

/// Ratios derived from a player's counting statistics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedFeatures {
    /// Not outs per innings
    pub not_out_ratio: f64,
    /// Ducks per innings
    pub duck_rate: f64,
    /// Centuries per innings
    pub century_frequency: f64,
    /// Share of fifty-plus scores converted into centuries
    pub century_conversion_rate: f64,
    /// Balls faced per innings
    pub balls_per_innings: f64,
}

impl DerivedFeatures {
    /// Number of derived ratios
    pub const DIM: usize = 5;

    /// Derive the ratios from raw statistics
    pub fn from_stats(stats: &RawPlayerStats) -> Self {
        let innings = u64::from(stats.innings);
        let fifty_plus = u64::from(stats.centuries) + u64::from(stats.half_centuries);

        DerivedFeatures {
            not_out_ratio: ratio(stats.not_outs, innings),
            duck_rate: ratio(stats.ducks, innings),
            century_frequency: ratio(stats.centuries, innings),
            century_conversion_rate: ratio(stats.centuries, fifty_plus),
            balls_per_innings: ratio(stats.balls_faced, innings),
        }
    }

    /// Labelled values in display order
    pub fn labelled(&self) -> [(&'static str, f64); Self::DIM] {
        [
            ("Not Out Ratio", self.not_out_ratio),
            ("Duck Rate", self.duck_rate),
            ("Century Frequency", self.century_frequency),
            ("Century Conversion Rate", self.century_conversion_rate),
            ("Balls Faced per Innings", self.balls_per_innings),
        ]
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.labelled().iter().map(|(_, v)| *v).collect()
    }
}

fn ratio(numerator: u32, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

const NUMERIC_DIM: usize = 12;

/// One row of model input, keyed by the column names the pipeline was fitted on
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    numeric: [(&'static str, f64); NUMERIC_DIM],
    country: String,
}

impl FeatureRow {
    pub const NUMERIC_DIM: usize = NUMERIC_DIM;
    pub const COUNTRY_COLUMN: &'static str = "country";

    /// Numeric column names in table order
    pub const NUMERIC_COLUMNS: [&'static str; Self::NUMERIC_DIM] = [
        "matches",
        "innings",
        "runs",
        "highest score",
        "average",
        "strike rate",
        "duration",
        "not out ratio",
        "duck rate",
        "century frequency",
        "century conversion rate",
        "balls faced per innings",
    ];

    /// Build the row from raw statistics and their derived ratios
    ///
    /// `country` should already be the canonical spelling known to the artifact.
    pub fn new(stats: &RawPlayerStats, derived: &DerivedFeatures, country: &str) -> Self {
        let values = [
            stats.matches as f64,
            stats.innings as f64,
            stats.runs as f64,
            stats.highest_score as f64,
            stats.average,
            stats.strike_rate,
            stats.duration,
            derived.not_out_ratio,
            derived.duck_rate,
            derived.century_frequency,
            derived.century_conversion_rate,
            derived.balls_per_innings,
        ];

        let mut numeric = [("", 0.0); Self::NUMERIC_DIM];
        for (slot, (name, value)) in numeric
            .iter_mut()
            .zip(Self::NUMERIC_COLUMNS.iter().zip(values))
        {
            *slot = (*name, value);
        }

        FeatureRow {
            numeric,
            country: country.to_string(),
        }
    }

    /// Look up a numeric column by name
    pub fn numeric(&self, column: &str) -> Option<f64> {
        self.numeric
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| *value)
    }

    /// Look up a categorical column by name
    pub fn categorical(&self, column: &str) -> Option<&str> {
        if column == Self::COUNTRY_COLUMN {
            Some(&self.country)
        } else {
            None
        }
    }

    pub fn country(&self) -> &str {
        &self.country
    }
}
