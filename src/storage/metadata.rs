//! Metadata join table: id → segment record, kept separate from the
//! vectors so embeddings can be rebuilt without re-deriving metadata.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::{IndexError, SegmentId, SegmentRecord};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataTable {
    rows: HashMap<SegmentId, SegmentRecord>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = SegmentRecord>) -> Self {
        Self {
            rows: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn insert(&mut self, record: SegmentRecord) {
        self.rows.insert(record.id.clone(), record);
    }

    /// O(1) lookup. Fails with `NotFound` for ids outside the snapshot;
    /// never happens for an id returned by a same-snapshot search.
    pub fn get(&self, id: &str) -> Result<&SegmentRecord, IndexError> {
        self.rows
            .get(id)
            .ok_or_else(|| IndexError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SegmentRecord> {
        self.rows.values()
    }
}
