//! Fitted feature-transform pipeline
//!
//! The pipeline is fitted offline. Here it is only applied: numeric columns
//! are standard-scaled, the categorical column is one-hot encoded and the
//! concatenation is optionally projected onto a set of centred components.
//! A categorical value outside the fitted categories is a mismatch, never an
//! all-zero encoding.

use std::marker::PhantomData;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::features::FeatureRow;
use crate::{Result, TalentError};

/// Maps a feature row into the pipeline's output space
pub trait FeatureTransform: Send + Sync {
    /// Transform a single row into one output vector
    fn transform(&self, row: &FeatureRow) -> Result<Vec<f32>>;

    /// Length of every vector returned by `transform`
    fn output_dim(&self) -> usize;
}

/// Standard scaler parameters, one entry per numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerSpec {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

/// Centred linear projection applied after encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSpec {
    pub mean: Vec<f32>,
    /// One row per output component
    pub components: Vec<Vec<f32>>,
}

/// Serialized form of a fitted pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub numeric_columns: Vec<String>,
    pub scaler: ScalerSpec,
    pub categorical_column: String,
    pub categories: Vec<String>,
    #[serde(default)]
    pub projection: Option<ProjectionSpec>,
}

impl PipelineSpec {
    /// Width after scaling and one-hot encoding
    pub fn encoded_dim(&self) -> usize {
        self.numeric_columns.len() + self.categories.len()
    }

    /// Width of the final output vector
    pub fn output_dim(&self) -> usize {
        match &self.projection {
            Some(p) => p.components.len(),
            None => self.encoded_dim(),
        }
    }

    /// Check that the fitted parameters agree with each other
    pub fn validate(&self) -> std::result::Result<(), String> {
        let n = self.numeric_columns.len();
        if n == 0 {
            return Err("pipeline has no numeric columns".to_string());
        }
        if self.categories.is_empty() {
            return Err(format!(
                "pipeline has no categories for column '{}'",
                self.categorical_column
            ));
        }
        if self.scaler.mean.len() != n || self.scaler.scale.len() != n {
            return Err(format!(
                "scaler has {} means and {} scales for {} numeric columns",
                self.scaler.mean.len(),
                self.scaler.scale.len(),
                n
            ));
        }
        if let Some(p) = &self.projection {
            let width = self.encoded_dim();
            if p.components.is_empty() {
                return Err("projection has no components".to_string());
            }
            if p.mean.len() != width {
                return Err(format!(
                    "projection mean has width {}, encoded width is {}",
                    p.mean.len(),
                    width
                ));
            }
            if let Some(bad) = p.components.iter().position(|c| c.len() != width) {
                return Err(format!(
                    "projection component {} has width {}, encoded width is {}",
                    bad,
                    p.components[bad].len(),
                    width
                ));
            }
        }
        let all_params = self
            .scaler
            .mean
            .iter()
            .chain(&self.scaler.scale)
            .chain(self.projection.iter().flat_map(|p| {
                p.mean.iter().chain(p.components.iter().flatten())
            }));
        if all_params.into_iter().any(|v| !v.is_finite()) {
            return Err("pipeline contains non-finite parameters".to_string());
        }
        Ok(())
    }
}

/// A fitted pipeline evaluated with burn tensors
#[derive(Debug, Clone)]
pub struct FittedPipeline<B: Backend> {
    spec: PipelineSpec,
    /// Scale with zero entries replaced by 1
    safe_scale: Vec<f32>,
    device: B::Device,
    _backend: PhantomData<B>,
}

impl<B: Backend> FittedPipeline<B> {
    pub fn new(spec: PipelineSpec, device: B::Device) -> Result<Self> {
        spec.validate().map_err(TalentError::ArtifactUnavailable)?;
        let safe_scale = spec
            .scaler
            .scale
            .iter()
            .map(|&s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(FittedPipeline {
            spec,
            safe_scale,
            device,
            _backend: PhantomData,
        })
    }

    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    /// Pull the numeric columns out of the row in fitted order
    fn numeric_values(&self, row: &FeatureRow) -> Result<Vec<f32>> {
        self.spec
            .numeric_columns
            .iter()
            .map(|column| {
                row.numeric(column).map(|v| v as f32).ok_or_else(|| {
                    TalentError::TransformMismatch(format!(
                        "pipeline expects numeric column '{}' which the feature row does not have",
                        column
                    ))
                })
            })
            .collect()
    }

    fn one_hot(&self, row: &FeatureRow) -> Result<Vec<f32>> {
        let value = row
            .categorical(&self.spec.categorical_column)
            .ok_or_else(|| {
                TalentError::TransformMismatch(format!(
                    "pipeline expects categorical column '{}' which the feature row does not have",
                    self.spec.categorical_column
                ))
            })?;

        let index = self
            .spec
            .categories
            .iter()
            .position(|c| c == value)
            .ok_or_else(|| {
                TalentError::TransformMismatch(format!(
                    "'{}' is not one of the {} fitted categories of column '{}'",
                    value,
                    self.spec.categories.len(),
                    self.spec.categorical_column
                ))
            })?;

        let mut encoded = vec![0.0; self.spec.categories.len()];
        encoded[index] = 1.0;
        Ok(encoded)
    }
}

impl<B: Backend> FeatureTransform for FittedPipeline<B> {
    fn transform(&self, row: &FeatureRow) -> Result<Vec<f32>> {
        let numeric = self.numeric_values(row)?;
        let one_hot = self.one_hot(row)?;

        let x = Tensor::<B, 1>::from_floats(numeric.as_slice(), &self.device);
        let mean = Tensor::<B, 1>::from_floats(self.spec.scaler.mean.as_slice(), &self.device);
        let scale = Tensor::<B, 1>::from_floats(self.safe_scale.as_slice(), &self.device);
        let scaled = (x - mean) / scale;

        let categorical = Tensor::<B, 1>::from_floats(one_hot.as_slice(), &self.device);
        let encoded = Tensor::cat(vec![scaled, categorical], 0);

        let output = match &self.spec.projection {
            Some(projection) => {
                let width = self.spec.encoded_dim();
                let n_components = projection.components.len();
                let flat: Vec<f32> = projection.components.iter().flatten().copied().collect();

                let centre = Tensor::<B, 1>::from_floats(projection.mean.as_slice(), &self.device);
                let components = Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device)
                    .reshape([n_components, width]);

                // [d, width] x [width, 1]
                components
                    .matmul((encoded - centre).reshape([width, 1]))
                    .reshape([n_components])
            }
            None => encoded,
        };

        output.into_data().to_vec::<f32>().map_err(|e| {
            TalentError::TransformMismatch(format!("could not read transformed vector: {:?}", e))
        })
    }

    fn output_dim(&self) -> usize {
        self.spec.output_dim()
    }
}
