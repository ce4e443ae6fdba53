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

//! Incremental append tests: model identity checks, exact count
//! growth, duplicate and malformed record handling.

mod common;

use std::sync::Arc;

use clipseek::builder::IndexBuilder;
use clipseek::core::{BuildError, EmbeddingConfig, IndexConfig, SegmentRecord};
use clipseek::index::VectorIndex;
use clipseek::ingest::VecRecordSource;

use common::{pet_corpus, test_stack, StubEmbedder};

#[tokio::test]
async fn append_without_a_snapshot_is_rejected() {
    let stack = test_stack(Arc::new(StubEmbedder::new()));
    let mut source = VecRecordSource::new(pet_corpus());
    let err = stack.builder.append(&mut source).await.unwrap_err();
    assert!(matches!(err, BuildError::NoSnapshot));
}

#[tokio::test]
async fn append_with_matching_model_grows_count_by_exactly_the_valid_records() {
    let stack = test_stack(Arc::new(StubEmbedder::new()));
    let mut source = VecRecordSource::new(pet_corpus());
    stack.builder.build(&mut source).await.unwrap();
    assert_eq!(stack.snapshots.current().unwrap().index.len(), 3);

    let mut additions = VecRecordSource::new(vec![
        SegmentRecord::new("d", "hamsters enjoy running wheels"),
        SegmentRecord::new("a", "already indexed under this id"),
        SegmentRecord::new("e", "   "),
        SegmentRecord::new("f", "goldfish have short memories"),
    ]);
    let report = stack.builder.append(&mut additions).await.unwrap();

    // Two valid new records; the duplicate and the empty text are
    // skipped and reported.
    assert_eq!(report.indexed, 2);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.snapshot_version, 2);

    let snapshot = stack.snapshots.current().unwrap();
    assert_eq!(snapshot.version, 2);
    assert_eq!(snapshot.index.len(), 5);
    assert_eq!(snapshot.metadata.len(), 5);
    assert_eq!(snapshot.manifest.vector_count, 5);

    // The original record survives untouched.
    assert_eq!(
        snapshot.metadata.get("a").unwrap().text,
        "cats are great pets"
    );
}

#[tokio::test]
async fn append_with_mismatched_model_is_rejected() {
    let stack = test_stack(Arc::new(StubEmbedder::with_model_id("stub-model-a")));
    let mut source = VecRecordSource::new(pet_corpus());
    stack.builder.build(&mut source).await.unwrap();

    // A builder wired to a different model over the same snapshot store
    // must refuse to append.
    let other_builder = IndexBuilder::new(
        Arc::new(StubEmbedder::with_model_id("stub-model-b")),
        stack.snapshots.clone(),
        IndexConfig::default(),
        &EmbeddingConfig::default(),
        None,
    );

    let mut additions =
        VecRecordSource::new(vec![SegmentRecord::new("d", "ferrets are curious")]);
    let err = other_builder.append(&mut additions).await.unwrap_err();
    assert!(matches!(
        err,
        BuildError::ModelMismatch { snapshot, requested }
            if snapshot == "stub-model-a" && requested == "stub-model-b"
    ));

    // Snapshot unchanged by the rejected append.
    let snapshot = stack.snapshots.current().unwrap();
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.index.len(), 3);
}

#[tokio::test]
async fn appended_records_are_immediately_searchable() {
    let stack = test_stack(Arc::new(StubEmbedder::new()));
    let mut source = VecRecordSource::new(pet_corpus());
    stack.builder.build(&mut source).await.unwrap();

    let mut additions = VecRecordSource::new(vec![SegmentRecord::new(
        "d",
        "kittens and puppies are popular pets",
    )]);
    stack.builder.append(&mut additions).await.unwrap();

    let request = clipseek::query::SearchRequest {
        query: "pet animals".into(),
        k: 4,
        metric: None,
        min_score: None,
        filters: Vec::new(),
    };
    let response = stack.engine.search(&request).await.unwrap();
    assert_eq!(response.snapshot_version, 2);
    assert!(response.hits.iter().any(|h| h.id == "d"));
}
