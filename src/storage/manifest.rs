//! Snapshot manifest: the small JSON sidecar that makes the binary
//! blobs self-describing and lets `load` refuse mismatched state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compute::distance::DistanceMetric;
use crate::core::IndexError;
use crate::index::IndexKind;

/// Bumped when the on-disk layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    pub format_version: u32,
    /// Embedding model that produced every vector in the snapshot.
    pub model_id: String,
    pub dimension: usize,
    pub vector_count: usize,
    pub metric: DistanceMetric,
    pub index_kind: IndexKind,
    pub built_at: DateTime<Utc>,
}

impl IndexManifest {
    pub fn new(
        model_id: impl Into<String>,
        dimension: usize,
        vector_count: usize,
        metric: DistanceMetric,
        index_kind: IndexKind,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            model_id: model_id.into(),
            dimension,
            vector_count,
            metric,
            index_kind,
            built_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, IndexError> {
        serde_json::to_string_pretty(self).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, IndexError> {
        let manifest: Self = serde_json::from_str(json)
            .map_err(|e| IndexError::Corrupt(format!("manifest unreadable: {}", e)))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported manifest format version {} (expected {})",
                manifest.format_version, FORMAT_VERSION
            )));
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips_through_json() {
        let manifest = IndexManifest::new(
            "feature-hash-v1/64",
            64,
            12,
            DistanceMetric::Cosine,
            IndexKind::Flat,
        );
        let restored = IndexManifest::from_json(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(restored, manifest);
    }

    #[test]
    fn unknown_format_version_is_corrupt() {
        let mut manifest = IndexManifest::new(
            "m",
            4,
            0,
            DistanceMetric::Euclidean,
            IndexKind::Hnsw,
        );
        manifest.format_version = 99;
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(matches!(
            IndexManifest::from_json(&json),
            Err(IndexError::Corrupt(_))
        ));
    }

    #[test]
    fn garbage_is_corrupt_not_a_panic() {
        assert!(matches!(
            IndexManifest::from_json("{not json"),
            Err(IndexError::Corrupt(_))
        ));
    }
}
