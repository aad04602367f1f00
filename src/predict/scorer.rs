//! Similarity scoring against elite players

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use serde::{Deserialize, Serialize};

use super::classify::{Classification, TierPolicy};
use crate::features::{DerivedFeatures, FeatureRow};
use crate::model::{FeatureTransform, FittedPipeline, ReferenceMatrix, ScoringArtifact};
use crate::{RawPlayerStats, Result, TalentError};

/// Round to 2 decimal places, halves away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean similarity scaled to 0-100
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct TalentScore(f64);

impl TalentScore {
    /// Scale a mean cosine similarity into a score
    ///
    /// Negative similarity clamps to 0.
    pub fn from_similarity(mean_similarity: f64) -> Self {
        TalentScore(round2((mean_similarity * 100.0).clamp(0.0, 100.0)))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Result of evaluating one player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub name: String,
    /// Canonical country spelling from the artifact
    pub country: String,
    pub score: TalentScore,
    pub classification: Classification,
    pub derived: DerivedFeatures,
}

/// Scores players against the elite reference set of one artifact
///
/// Built once per process and shared read-only across evaluations.
pub struct TalentScorer<B: Backend> {
    transform: Box<dyn FeatureTransform>,
    reference: ReferenceMatrix,
    countries: Vec<String>,
    policy: TierPolicy,
    device: B::Device,
}

impl<B: Backend> TalentScorer<B> {
    /// Create a scorer from its parts
    pub fn new(
        transform: Box<dyn FeatureTransform>,
        reference: ReferenceMatrix,
        countries: Vec<String>,
        policy: TierPolicy,
        device: B::Device,
    ) -> Result<Self> {
        if transform.output_dim() != reference.dim() {
            return Err(TalentError::TransformMismatch(format!(
                "transform produces {} features but elite vectors have {}",
                transform.output_dim(),
                reference.dim()
            )));
        }
        if countries.is_empty() {
            return Err(TalentError::ArtifactUnavailable(
                "no known countries".to_string(),
            ));
        }

        Ok(TalentScorer {
            transform,
            reference,
            countries,
            policy,
            device,
        })
    }

    /// Create a scorer backed by the artifact's fitted pipeline
    pub fn from_artifact(
        artifact: ScoringArtifact,
        policy: TierPolicy,
        device: B::Device,
    ) -> Result<Self> {
        artifact.validate()?;
        let reference = artifact.reference_matrix()?;
        let pipeline = FittedPipeline::<B>::new(artifact.pipeline, device.clone())?;

        Self::new(
            Box::new(pipeline),
            reference,
            artifact.countries,
            policy,
            device,
        )
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn reference_vectors(&self) -> &ReferenceMatrix {
        &self.reference
    }

    pub fn policy(&self) -> TierPolicy {
        self.policy
    }

    /// Find the artifact's spelling of a country, ignoring case and padding
    pub fn resolve_country(&self, country: &str) -> Result<&str> {
        let wanted = country.trim().to_lowercase();
        self.countries
            .iter()
            .find(|c| c.to_lowercase() == wanted)
            .map(|c| c.as_str())
            .ok_or_else(|| TalentError::UnknownCountry {
                country: country.to_string(),
                known: self.countries.len(),
            })
    }

    /// Check a submission before anything reaches the transform
    ///
    /// Returns the canonical country on success.
    pub fn validate(&self, stats: &RawPlayerStats) -> Result<&str> {
        stats.validate()?;
        self.resolve_country(&stats.country)
    }

    /// Cosine similarity of `vector` with every elite row
    ///
    /// Similarity involving a zero vector is 0.
    pub fn similarities(&self, vector: &[f32]) -> Result<Vec<f32>> {
        let dim = self.reference.dim();
        let rows = self.reference.rows();
        if vector.len() != dim {
            return Err(TalentError::TransformMismatch(format!(
                "transformed vector has {} features, elite vectors have {}",
                vector.len(),
                dim
            )));
        }

        // Cosine similarity ignores magnitude; keep the squares inside f32 range
        let peak = vector.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        let scaled: Vec<f32> = if peak > 1.0 {
            vector.iter().map(|v| v / peak).collect()
        } else {
            vector.to_vec()
        };

        let query = Tensor::<B, 1>::from_floats(scaled.as_slice(), &self.device).reshape([dim, 1]);
        let reference = Tensor::<B, 1>::from_floats(self.reference.as_slice(), &self.device)
            .reshape([rows, dim]);

        let query_norm: f32 = query
            .clone()
            .powf_scalar(2.0)
            .sum()
            .sqrt()
            .into_scalar()
            .elem();
        let norms = reference
            .clone()
            .powf_scalar(2.0)
            .sum_dim(1)
            .sqrt()
            .mul_scalar(query_norm);
        let zero = norms.clone().equal_elem(0.0);

        // [rows, dim] x [dim, 1]
        let dots = reference.matmul(query);
        let similarities = (dots / norms.mask_fill(zero.clone(), 1.0)).mask_fill(zero, 0.0);

        similarities
            .reshape([rows])
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| {
                TalentError::TransformMismatch(format!("could not read similarities: {:?}", e))
            })
    }

    /// Score an already-built feature row
    pub fn score_row(&self, row: &FeatureRow) -> Result<TalentScore> {
        let vector = self.transform.transform(row)?;
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(TalentError::InvalidInput(
                "statistics are too large to score".to_string(),
            ));
        }
        let similarities = self.similarities(&vector)?;

        let mean = similarities.iter().map(|&s| s as f64).sum::<f64>() / similarities.len() as f64;
        if !mean.is_finite() {
            return Err(TalentError::TransformMismatch(
                "transform produced non-finite values".to_string(),
            ));
        }

        Ok(TalentScore::from_similarity(mean))
    }

    /// Validate, derive, score and classify one player
    pub fn evaluate(&self, stats: &RawPlayerStats) -> Result<Evaluation> {
        let country = self.validate(stats)?;
        let derived = DerivedFeatures::from_stats(stats);
        let row = FeatureRow::new(stats, &derived, country);

        let score = self.score_row(&row)?;
        let classification = self.policy.classify(score.value());
        log::debug!(
            "Scored {}: {:.2} -> {}",
            stats.display_name(),
            score.value(),
            classification
        );

        Ok(Evaluation {
            name: stats.display_name().to_string(),
            country: country.to_string(),
            score,
            classification,
            derived,
        })
    }

    /// Evaluate several players independently
    pub fn evaluate_batch(&self, players: &[RawPlayerStats]) -> Vec<Result<Evaluation>> {
        players.iter().map(|p| self.evaluate(p)).collect()
    }
}

/// Format an evaluation for display
pub fn format_evaluation(eval: &Evaluation) -> String {
    let mut out = format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {} ({})
├─────────────────────────────────────────────────┤
│  Class:        {}
│  Talent score: {:.2}
├─────────────────────────────────────────────────┤
│  Derived stats
"#,
        eval.name,
        eval.country,
        eval.classification,
        eval.score.value(),
    );
    for (label, value) in eval.derived.labelled() {
        out.push_str(&format!("│    {:<24} {:.2}\n", label, value));
    }
    out.push_str("└─────────────────────────────────────────────────┘\n");
    out
}
