//! The scoring artifact bundle
//!
//! Holds the fitted pipeline, the elite players' transformed vectors and the
//! countries the pipeline knows about. Loaded once, never mutated.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::pipeline::PipelineSpec;
use crate::{Result, TalentError};

/// Deserialized scoring artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringArtifact {
    pub pipeline: PipelineSpec,
    /// Transformed elite player rows
    pub elite_data: Vec<Vec<f32>>,
    pub countries: Vec<String>,
}

impl ScoringArtifact {
    /// Parse and validate an artifact from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let artifact: ScoringArtifact = serde_json::from_str(json).map_err(|e| {
            TalentError::ArtifactUnavailable(format!("failed to deserialize artifact: {}", e))
        })?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Load and validate an artifact file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TalentError::ArtifactUnavailable(format!(
                "failed to read artifact {}: {}",
                path.display(),
                e
            ))
        })?;
        let artifact = Self::from_json(&content)?;
        log::info!(
            "Loaded artifact from {} ({} elite players, {} countries)",
            path.display(),
            artifact.elite_data.len(),
            artifact.countries.len()
        );
        Ok(artifact)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string(self).map_err(|e| {
            TalentError::ArtifactUnavailable(format!("failed to serialize artifact: {}", e))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that the three components fit together
    pub fn validate(&self) -> Result<()> {
        self.pipeline
            .validate()
            .map_err(|e| TalentError::ArtifactUnavailable(format!("invalid pipeline: {}", e)))?;

        if self.countries.is_empty() {
            return Err(TalentError::ArtifactUnavailable(
                "artifact has an empty country list".to_string(),
            ));
        }

        if let Some(unfitted) = self
            .countries
            .iter()
            .find(|c| !self.pipeline.categories.contains(c))
        {
            return Err(TalentError::ArtifactUnavailable(format!(
                "country '{}' is accepted but the pipeline was not fitted on it",
                unfitted
            )));
        }

        ReferenceMatrix::from_rows(&self.elite_data, self.pipeline.output_dim()).map(|_| ())
    }

    pub fn reference_matrix(&self) -> Result<ReferenceMatrix> {
        ReferenceMatrix::from_rows(&self.elite_data, self.pipeline.output_dim())
    }
}

/// Elite player vectors stored row-major
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMatrix {
    data: Vec<f32>,
    rows: usize,
    dim: usize,
}

impl ReferenceMatrix {
    /// Build from rows that must all have length `dim`
    pub fn from_rows(rows: &[Vec<f32>], dim: usize) -> Result<Self> {
        if rows.is_empty() {
            return Err(TalentError::ArtifactUnavailable(
                "artifact has no elite players".to_string(),
            ));
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != dim) {
            return Err(TalentError::ArtifactUnavailable(format!(
                "elite row {} has width {}, pipeline output is {}",
                bad,
                rows[bad].len(),
                dim
            )));
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(TalentError::ArtifactUnavailable(
                "elite data contains non-finite values".to_string(),
            ));
        }

        Ok(ReferenceMatrix {
            data: rows.iter().flatten().copied().collect(),
            rows: rows.len(),
            dim,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index < self.rows {
            Some(&self.data[index * self.dim..(index + 1) * self.dim])
        } else {
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::pipeline::tests::identity_spec;

    pub(crate) fn sample_artifact() -> ScoringArtifact {
        let spec = identity_spec();
        let width = spec.output_dim();
        let mut elite_a = vec![0.0; width];
        elite_a[0] = 1.0;
        let mut elite_b = vec![0.0; width];
        elite_b[2] = 1.0;

        ScoringArtifact {
            pipeline: spec,
            elite_data: vec![elite_a, elite_b],
            countries: vec!["Australia".to_string(), "India".to_string()],
        }
    }

    #[test]
    fn test_json_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let artifact = sample_artifact();
        artifact.save(&path).unwrap();
        let loaded = ScoringArtifact::load(&path).unwrap();

        assert_eq!(loaded, artifact);
    }

    #[test]
    fn test_projection_is_optional_in_json() {
        let artifact = sample_artifact();
        let mut value = serde_json::to_value(&artifact).unwrap();
        value["pipeline"]
            .as_object_mut()
            .unwrap()
            .remove("projection");

        let parsed = ScoringArtifact::from_json(&value.to_string()).unwrap();
        assert!(parsed.pipeline.projection.is_none());
    }

    #[test]
    fn test_missing_component_is_unavailable() {
        let err = ScoringArtifact::from_json(r#"{"pipeline": null, "countries": []}"#)
            .unwrap_err();
        assert!(matches!(err, TalentError::ArtifactUnavailable(_)));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScoringArtifact::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, TalentError::ArtifactUnavailable(_)));
    }

    #[test]
    fn test_elite_width_must_match_pipeline() {
        let mut artifact = sample_artifact();
        artifact.elite_data[1].push(0.0);
        let err = artifact.validate().unwrap_err();
        assert!(err.to_string().contains("elite row 1"));
    }

    #[test]
    fn test_empty_countries_rejected() {
        let mut artifact = sample_artifact();
        artifact.countries.clear();
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn test_country_outside_fitted_categories_rejected() {
        let mut artifact = sample_artifact();
        artifact.countries.push("Nepal".to_string());

        let err = artifact.validate().unwrap_err();
        assert!(matches!(err, TalentError::ArtifactUnavailable(_)));
        assert!(err.to_string().contains("Nepal"));
        assert!(ScoringArtifact::from_json(&serde_json::to_string(&artifact).unwrap()).is_err());
    }

    #[test]
    fn test_countries_may_be_subset_of_categories() {
        let mut artifact = sample_artifact();
        artifact.countries.retain(|c| c == "India");
        assert!(artifact.validate().is_ok());
    }

    #[test]
    fn test_empty_elite_rejected() {
        let mut artifact = sample_artifact();
        artifact.elite_data.clear();
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn test_reference_matrix_rows() {
        let matrix = sample_artifact().reference_matrix().unwrap();
        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.dim(), 14);
        assert_eq!(matrix.row(1).unwrap()[2], 1.0);
        assert!(matrix.row(2).is_none());
        assert_eq!(matrix.as_slice().len(), 28);
    }
}
