use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type SegmentId = String;
pub type Vector = Vec<f32>;

/// A transcript segment handed to the index builder by the ingestion
/// collaborator. `id` is the source natural key (video id, or
/// `<video_id>:<ordinal>` for per-segment granularity) and is stable
/// across rebuilds. Immutable once embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentRecord {
    pub id: SegmentId,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SegmentRecord {
    pub fn new(id: impl Into<SegmentId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A single ranked search hit joined against the metadata table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: SegmentId,
    /// Normalized score in [0, 1], higher = closer. See
    /// `compute::distance::normalize_score` for the per-metric mapping.
    pub score: f32,
    pub metadata: HashMap<String, serde_json::Value>,
}
