//! Scoring artifact and fitted pipeline

pub mod artifact;
pub mod pipeline;

pub use artifact::{ReferenceMatrix, ScoringArtifact};
pub use pipeline::{FeatureTransform, FittedPipeline, PipelineSpec};
