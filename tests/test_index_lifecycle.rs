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

//! Build lifecycle tests: serialization of builds, snapshot pinning,
//! abort semantics and skip-and-report behavior.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clipseek::builder::BuildPhase;
use clipseek::core::{BuildError, SegmentRecord};
use clipseek::index::VectorIndex;
use clipseek::ingest::{RecordSource, VecRecordSource};

use common::{pet_corpus, test_stack, StubEmbedder};

/// Source that stalls before yielding its records, keeping a build
/// in flight long enough to race against.
struct SlowSource {
    records: Option<Vec<SegmentRecord>>,
    delay: Duration,
}

impl SlowSource {
    fn new(records: Vec<SegmentRecord>, delay: Duration) -> Self {
        Self {
            records: Some(records),
            delay,
        }
    }
}

#[async_trait]
impl RecordSource for SlowSource {
    async fn next_batch(&mut self, _max: usize) -> anyhow::Result<Vec<SegmentRecord>> {
        match self.records.take() {
            Some(records) => {
                tokio::time::sleep(self.delay).await;
                Ok(records)
            }
            None => Ok(Vec::new()),
        }
    }
}

#[tokio::test]
async fn concurrent_build_is_rejected_then_next_build_bumps_version_by_one() {
    let stack = test_stack(Arc::new(StubEmbedder::new()));
    let builder = stack.builder.clone();

    let first = tokio::spawn(async move {
        let mut source = SlowSource::new(pet_corpus(), Duration::from_millis(200));
        builder.build(&mut source).await
    });

    // Give the first build time to claim the slot.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(stack.builder.build_in_progress());

    let mut second_source = VecRecordSource::new(pet_corpus());
    let rejected = stack.builder.build(&mut second_source).await;
    assert!(matches!(rejected, Err(BuildError::InProgress)));

    let first_report = first.await.unwrap().unwrap();
    assert_eq!(first_report.snapshot_version, 1);

    let mut third_source = VecRecordSource::new(pet_corpus());
    let second_report = stack.builder.build(&mut third_source).await.unwrap();
    assert_eq!(second_report.snapshot_version, 2);
    assert_eq!(stack.snapshots.current_version(), 2);
}

#[tokio::test]
async fn in_flight_reader_keeps_its_snapshot_through_a_rebuild() {
    let stack = test_stack(Arc::new(StubEmbedder::new()));

    let mut source = VecRecordSource::new(pet_corpus());
    stack.builder.build(&mut source).await.unwrap();

    // A request resolves its snapshot once and holds the Arc.
    let pinned = stack.snapshots.current().unwrap();
    assert_eq!(pinned.version, 1);
    assert_eq!(pinned.index.len(), 3);

    let mut bigger = pet_corpus();
    bigger.push(SegmentRecord::new("d", "parrots can mimic speech"));
    let mut source = VecRecordSource::new(bigger);
    stack.builder.build(&mut source).await.unwrap();

    // The pinned view is untouched and internally consistent.
    assert_eq!(pinned.version, 1);
    assert_eq!(pinned.index.len(), 3);
    assert_eq!(pinned.metadata.len(), pinned.index.len());
    let hits = pinned.index.search(&[0.5, 0.0, 0.0, 0.5], 1, None).unwrap();
    assert_eq!(hits.len(), 1);

    let current = stack.snapshots.current().unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(current.index.len(), 4);
    assert_eq!(current.metadata.len(), 4);
}

#[tokio::test]
async fn abort_stops_before_publish_and_keeps_previous_snapshot() {
    let stack = test_stack(Arc::new(StubEmbedder::new()));

    let mut source = VecRecordSource::new(pet_corpus());
    stack.builder.build(&mut source).await.unwrap();
    assert_eq!(stack.snapshots.current_version(), 1);

    let builder = stack.builder.clone();
    let aborted = tokio::spawn(async move {
        let mut source = SlowSource::new(pet_corpus(), Duration::from_millis(200));
        builder.build(&mut source).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(stack.builder.request_abort());

    let result = aborted.await.unwrap();
    assert!(matches!(result, Err(BuildError::Aborted)));

    // Previous snapshot untouched, failure recorded, slot released.
    assert_eq!(stack.snapshots.current_version(), 1);
    let status = stack.builder.status();
    assert!(!status.in_progress);
    assert_eq!(status.phase, BuildPhase::Failed);
    assert!(status.last_failure.unwrap().contains("aborted"));

    // A follow-up build succeeds and publishes version 2.
    let mut source = VecRecordSource::new(pet_corpus());
    let report = stack.builder.build(&mut source).await.unwrap();
    assert_eq!(report.snapshot_version, 2);
}

#[tokio::test]
async fn malformed_records_are_skipped_and_enumerated_not_fatal() {
    let stack = test_stack(Arc::new(StubEmbedder::new()));

    let mut corpus = pet_corpus();
    corpus.push(SegmentRecord::new("bad-empty", "   "));
    corpus.push(SegmentRecord::new("a", "duplicate of the first record"));
    corpus.push(SegmentRecord::new("", "record without an id"));

    let mut source = VecRecordSource::new(corpus);
    let report = stack.builder.build(&mut source).await.unwrap();

    assert_eq!(report.indexed, 3);
    assert_eq!(report.skipped.len(), 3);
    let reasons: Vec<&str> = report.skipped.iter().map(|s| s.reason.as_str()).collect();
    assert!(reasons.iter().any(|r| r.contains("empty text")));
    assert!(reasons.iter().any(|r| r.contains("duplicate")));
    assert!(reasons.iter().any(|r| r.contains("empty id")));

    // Counts stay consistent at the committed version.
    let snapshot = stack.snapshots.current().unwrap();
    assert_eq!(snapshot.index.len(), 3);
    assert_eq!(snapshot.metadata.len(), 3);
    assert_eq!(snapshot.manifest.vector_count, 3);
}

#[tokio::test]
async fn successful_build_returns_the_builder_to_idle() {
    let stack = test_stack(Arc::new(StubEmbedder::new()));
    let mut source = VecRecordSource::new(pet_corpus());
    stack.builder.build(&mut source).await.unwrap();

    let status = stack.builder.status();
    assert!(!status.in_progress);
    assert_eq!(status.phase, BuildPhase::Idle);
    assert!(status.last_failure.is_none());
}

#[tokio::test]
async fn staleness_reflects_corpus_drift_counters() {
    let stack = test_stack(Arc::new(StubEmbedder::new()));
    let mut source = VecRecordSource::new(pet_corpus());
    stack.builder.build(&mut source).await.unwrap();

    assert!(!stack.snapshots.is_stale(3, 10));
    assert!(stack.snapshots.is_stale(13, 10));
}
