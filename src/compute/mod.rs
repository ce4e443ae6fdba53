//! Vector math shared by the index backends and the query engine.

pub mod distance;

pub use distance::{distance, normalize_score, DistanceMetric};
