/*
 * Copyright 2025 ClipSeek
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Versioned snapshot handle
//!
//! The snapshot reference is the only mutable shared state on the
//! query path: written once per successful build, read by every
//! request. Readers clone the `Arc` exactly once at request start and
//! keep using it for the whole request, so a publish that lands
//! mid-query never changes what that query sees. The previous snapshot
//! stays alive until its last reader drops it.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::index::VectorIndex;

use super::manifest::IndexManifest;
use super::metadata::MetadataTable;

/// An immutable, versioned bundle of index + metadata. Invariant:
/// `index.len() == metadata.len()`, enforced at publish and at load.
pub struct IndexSnapshot {
    pub version: u64,
    pub manifest: IndexManifest,
    pub index: Box<dyn VectorIndex>,
    pub metadata: MetadataTable,
}

#[derive(Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    version: AtomicU64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest published snapshot, or `None` before the first build.
    pub fn current(&self) -> Option<Arc<IndexSnapshot>> {
        self.current.read().clone()
    }

    /// Version of the latest published snapshot; 0 before the first.
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Publish a freshly built snapshot. A single reference swap:
    /// concurrent readers observe either the fully old or fully new
    /// snapshot, never a mix. Returns the published handle.
    pub fn publish(
        &self,
        manifest: IndexManifest,
        index: Box<dyn VectorIndex>,
        metadata: MetadataTable,
    ) -> Arc<IndexSnapshot> {
        debug_assert_eq!(index.len(), metadata.len());

        let mut guard = self.current.write();
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(IndexSnapshot {
            version,
            manifest,
            index,
            metadata,
        });
        *guard = Some(snapshot.clone());
        info!(
            version,
            vectors = snapshot.manifest.vector_count,
            model_id = %snapshot.manifest.model_id,
            "published index snapshot"
        );
        snapshot
    }

    /// True when the live corpus has drifted materially past the
    /// published snapshot, signalling that a rebuild is due.
    pub fn is_stale(&self, corpus_len: usize, threshold: usize) -> bool {
        match self.current() {
            None => corpus_len > 0,
            Some(snapshot) => {
                corpus_len.abs_diff(snapshot.manifest.vector_count) >= threshold.max(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::distance::DistanceMetric;
    use crate::index::{FlatIndex, IndexKind};

    fn empty_parts(count: usize) -> (IndexManifest, Box<dyn VectorIndex>, MetadataTable) {
        let mut index = FlatIndex::new(DistanceMetric::Cosine, 2);
        let mut metadata = MetadataTable::new();
        let mut ids = Vec::new();
        let mut vectors = Vec::new();
        for i in 0..count {
            let id = format!("seg-{}", i);
            ids.push(id.clone());
            vectors.push(vec![i as f32, 1.0]);
            metadata.insert(crate::core::SegmentRecord::new(id, format!("text {}", i)));
        }
        index.append(ids, vectors).unwrap();
        let manifest = IndexManifest::new(
            "test-model",
            2,
            count,
            DistanceMetric::Cosine,
            IndexKind::Flat,
        );
        (manifest, Box::new(index), metadata)
    }

    #[test]
    fn versions_increase_by_exactly_one_per_publish() {
        let store = SnapshotStore::new();
        assert_eq!(store.current_version(), 0);
        assert!(store.current().is_none());

        let (m, i, t) = empty_parts(1);
        let first = store.publish(m, i, t);
        assert_eq!(first.version, 1);

        let (m, i, t) = empty_parts(2);
        let second = store.publish(m, i, t);
        assert_eq!(second.version, 2);
        assert_eq!(store.current_version(), 2);
    }

    #[test]
    fn readers_keep_their_snapshot_across_a_publish() {
        let store = SnapshotStore::new();
        let (m, i, t) = empty_parts(3);
        store.publish(m, i, t);

        let pinned = store.current().unwrap();
        assert_eq!(pinned.version, 1);
        assert_eq!(pinned.index.len(), 3);

        let (m, i, t) = empty_parts(5);
        store.publish(m, i, t);

        // The pinned reader still sees version 1 with consistent counts.
        assert_eq!(pinned.version, 1);
        assert_eq!(pinned.index.len(), 3);
        assert_eq!(pinned.metadata.len(), 3);
        assert_eq!(store.current().unwrap().version, 2);
    }

    #[test]
    fn staleness_tracks_corpus_drift() {
        let store = SnapshotStore::new();
        assert!(!store.is_stale(0, 10));
        assert!(store.is_stale(5, 10)); // no snapshot yet, corpus exists

        let (m, i, t) = empty_parts(100);
        store.publish(m, i, t);
        assert!(!store.is_stale(100, 10));
        assert!(!store.is_stale(105, 10));
        assert!(store.is_stale(110, 10));
    }
}
