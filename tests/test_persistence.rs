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

//! Persistence tests: atomic snapshot round-trips and corruption
//! detection on load.

mod common;

use std::fs;
use std::sync::Arc;

use clipseek::builder::IndexBuilder;
use clipseek::compute::distance::DistanceMetric;
use clipseek::core::{EmbeddingConfig, IndexConfig, IndexError};
use clipseek::index::{FlatIndex, IndexKind, VectorIndex};
use clipseek::ingest::VecRecordSource;
use clipseek::storage::{persistence, IndexManifest, MetadataTable, SnapshotStore};
use tempfile::TempDir;

use common::{pet_corpus, StubEmbedder};

fn sample_parts() -> (IndexManifest, FlatIndex, MetadataTable) {
    let ids: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
    let vectors = vec![
        vec![1.0, 0.0, 0.0],
        vec![0.0, 1.0, 0.0],
        vec![0.0, 0.0, 1.0],
    ];
    let index =
        FlatIndex::from_rows(DistanceMetric::Cosine, 3, ids.clone(), vectors).unwrap();
    let metadata = MetadataTable::from_records(
        ids.iter()
            .map(|id| clipseek::core::SegmentRecord::new(id.clone(), format!("text {}", id))),
    );
    let manifest = IndexManifest::new(
        "test-model",
        3,
        3,
        DistanceMetric::Cosine,
        IndexKind::Flat,
    );
    (manifest, index, metadata)
}

#[test]
fn snapshot_round_trips_with_identical_search_results() {
    let dir = TempDir::new().unwrap();
    let (manifest, index, metadata) = sample_parts();

    persistence::persist(dir.path(), &manifest, &index, &metadata).unwrap();
    assert!(persistence::exists(dir.path()));

    let (loaded_manifest, loaded_index, loaded_metadata) =
        persistence::load(dir.path()).unwrap();

    assert_eq!(loaded_manifest, manifest);
    assert_eq!(loaded_metadata.len(), 3);
    assert_eq!(
        loaded_index.search(&[0.9, 0.1, 0.0], 2, None).unwrap(),
        index.search(&[0.9, 0.1, 0.0], 2, None).unwrap(),
    );
}

#[test]
fn truncated_vector_blob_is_detected_as_corrupt() {
    let dir = TempDir::new().unwrap();
    let (manifest, index, metadata) = sample_parts();
    persistence::persist(dir.path(), &manifest, &index, &metadata).unwrap();

    let vectors_path = dir.path().join(persistence::VECTORS_FILE);
    let bytes = fs::read(&vectors_path).unwrap();
    fs::write(&vectors_path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(matches!(
        persistence::load(dir.path()),
        Err(IndexError::Corrupt(_))
    ));
}

#[test]
fn flipped_payload_byte_fails_the_checksum() {
    let dir = TempDir::new().unwrap();
    let (manifest, index, metadata) = sample_parts();
    persistence::persist(dir.path(), &manifest, &index, &metadata).unwrap();

    let metadata_path = dir.path().join(persistence::METADATA_FILE);
    let mut bytes = fs::read(&metadata_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&metadata_path, bytes).unwrap();

    assert!(matches!(
        persistence::load(dir.path()),
        Err(IndexError::Corrupt(_))
    ));
}

#[test]
fn manifest_dimension_disagreement_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let (mut manifest, index, metadata) = sample_parts();
    persistence::persist(dir.path(), &manifest, &index, &metadata).unwrap();

    // Rewrite the manifest claiming a different vector width.
    manifest.dimension = 7;
    fs::write(
        dir.path().join(persistence::MANIFEST_FILE),
        manifest.to_json().unwrap(),
    )
    .unwrap();

    assert!(matches!(
        persistence::load(dir.path()),
        Err(IndexError::Corrupt(_))
    ));
}

#[test]
fn missing_snapshot_directory_reports_io_not_corruption() {
    let dir = TempDir::new().unwrap();
    assert!(!persistence::exists(dir.path()));
    assert!(matches!(
        persistence::load(dir.path()),
        Err(IndexError::Io(_))
    ));
}

#[tokio::test]
async fn builder_persists_on_publish_and_a_new_store_can_reload() {
    let dir = TempDir::new().unwrap();
    let snapshots = Arc::new(SnapshotStore::new());
    let builder = IndexBuilder::new(
        Arc::new(StubEmbedder::new()),
        snapshots.clone(),
        IndexConfig::default(),
        &EmbeddingConfig::default(),
        Some(dir.path().to_path_buf()),
    );

    let mut source = VecRecordSource::new(pet_corpus());
    builder.build(&mut source).await.unwrap();

    // Simulate a fresh process: load from disk into a new store.
    let (manifest, index, metadata) = persistence::load(dir.path()).unwrap();
    assert_eq!(manifest.vector_count, 3);
    assert_eq!(manifest.model_id, "stub-topics-v1");
    assert_eq!(index.len(), 3);
    assert_eq!(metadata.len(), 3);

    let fresh = SnapshotStore::new();
    let published = fresh.publish(manifest, index, metadata);
    assert_eq!(published.version, 1);
    assert_eq!(fresh.current().unwrap().index.len(), 3);
}
