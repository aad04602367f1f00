//! Feature extraction
//!
//! Converts raw career statistics into the model-ready feature row.

pub mod derived;

pub use derived::{DerivedFeatures, FeatureRow};
