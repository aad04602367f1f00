//! Artifact acquisition
//!
//! Fetches the scoring artifact into a local cache at most once.

pub mod cache;

pub use cache::{with_retry, ArtifactCache};
