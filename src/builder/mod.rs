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

//! Index builder
//!
//! Drives a record source through embedding into a committed snapshot:
//! stage batches, embed, build the index once over the full staged set,
//! persist, publish. One build at a time; a concurrent trigger is
//! rejected, never queued. Per-record embedding failures skip the
//! record and continue — a partial corpus beats an aborted rebuild —
//! and the report enumerates every skip.
//!
//! Phases: Idle → Staging → Embedding → IndexBuilding → Publishing →
//! Idle, or → Failed with the prior snapshot left active.

pub mod report;

pub use report::{BuildReport, SkippedRecord};

use parking_lot::RwLock;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::core::{BuildError, EmbeddingConfig, IndexConfig, SegmentRecord};
use crate::embedding::TextEmbedder;
use crate::index::{self, VectorIndex};
use crate::ingest::RecordSource;
use crate::storage::{persistence, IndexManifest, MetadataTable, SnapshotStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    Idle,
    Staging,
    Embedding,
    IndexBuilding,
    Publishing,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildStatus {
    pub in_progress: bool,
    pub phase: BuildPhase,
    pub last_failure: Option<String>,
}

pub struct IndexBuilder {
    embedder: Arc<dyn TextEmbedder>,
    snapshots: Arc<SnapshotStore>,
    index_config: IndexConfig,
    batch_size: usize,
    /// Snapshots are persisted here before publish; `None` keeps the
    /// index memory-only (tests).
    index_dir: Option<PathBuf>,
    in_progress: AtomicBool,
    abort_requested: AtomicBool,
    phase: RwLock<BuildPhase>,
    last_failure: RwLock<Option<String>>,
}

/// Releases the single-build slot on every exit path.
struct BuildSlot<'a>(&'a IndexBuilder);

impl Drop for BuildSlot<'_> {
    fn drop(&mut self) {
        self.0.abort_requested.store(false, Ordering::Release);
        self.0.in_progress.store(false, Ordering::Release);
    }
}

impl IndexBuilder {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        snapshots: Arc<SnapshotStore>,
        index_config: IndexConfig,
        embedding_config: &EmbeddingConfig,
        index_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            embedder,
            snapshots,
            index_config,
            batch_size: embedding_config.batch_size.max(1),
            index_dir,
            in_progress: AtomicBool::new(false),
            abort_requested: AtomicBool::new(false),
            phase: RwLock::new(BuildPhase::Idle),
            last_failure: RwLock::new(None),
        }
    }

    pub fn build_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn status(&self) -> BuildStatus {
        BuildStatus {
            in_progress: self.build_in_progress(),
            phase: *self.phase.read(),
            last_failure: self.last_failure.read().clone(),
        }
    }

    /// Request a best-effort abort of the running build. Checked at
    /// batch boundaries; a build already publishing completes. Returns
    /// whether a build was running to receive the request.
    pub fn request_abort(&self) -> bool {
        if self.build_in_progress() {
            self.abort_requested.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Full rebuild: drain the source, embed everything, build one
    /// index over the full staged set and publish it atomically.
    pub async fn build(
        &self,
        source: &mut (dyn RecordSource + '_),
    ) -> Result<BuildReport, BuildError> {
        let _slot = self.acquire_slot()?;
        let started = Instant::now();

        let result = self.run_full_build(source, started).await;
        self.finish(&result);
        result
    }

    /// Incremental append onto the active snapshot. Requires the same
    /// embedding model the snapshot was built with; anything else must
    /// go through a full rebuild.
    pub async fn append(
        &self,
        source: &mut (dyn RecordSource + '_),
    ) -> Result<BuildReport, BuildError> {
        let _slot = self.acquire_slot()?;
        let started = Instant::now();

        let result = self.run_append(source, started).await;
        self.finish(&result);
        result
    }

    fn acquire_slot(&self) -> Result<BuildSlot<'_>, BuildError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BuildError::InProgress);
        }
        Ok(BuildSlot(self))
    }

    fn set_phase(&self, phase: BuildPhase) {
        *self.phase.write() = phase;
    }

    fn finish(&self, result: &Result<BuildReport, BuildError>) {
        match result {
            Ok(report) => {
                self.set_phase(BuildPhase::Idle);
                *self.last_failure.write() = None;
                info!(
                    version = report.snapshot_version,
                    indexed = report.indexed,
                    skipped = report.skipped.len(),
                    duration_ms = report.duration_ms,
                    "build complete"
                );
            }
            Err(error) => {
                self.set_phase(BuildPhase::Failed);
                *self.last_failure.write() = Some(error.to_string());
                warn!(error = %error, "build failed, previous snapshot remains active");
            }
        }
    }

    async fn run_full_build(
        &self,
        source: &mut (dyn RecordSource + '_),
        started: Instant,
    ) -> Result<BuildReport, BuildError> {
        let dimension = self.embedder.dimension();
        let mut staged_ids = Vec::new();
        let mut staged_vectors = Vec::new();
        let mut metadata = MetadataTable::new();
        let mut skipped = Vec::new();

        loop {
            self.set_phase(BuildPhase::Staging);
            if self.abort_requested.load(Ordering::Acquire) {
                return Err(BuildError::Aborted);
            }

            let batch = source
                .next_batch(self.batch_size)
                .await
                .map_err(|e| BuildError::Source(e.to_string()))?;
            if batch.is_empty() {
                break;
            }

            self.set_phase(BuildPhase::Embedding);
            self.embed_batch_into(
                batch,
                &mut staged_ids,
                &mut staged_vectors,
                &mut metadata,
                &mut skipped,
                |_| true,
            );
        }

        self.set_phase(BuildPhase::IndexBuilding);
        let count = staged_ids.len();
        let index = index::build_index(&self.index_config, dimension, staged_ids, staged_vectors)?;

        self.set_phase(BuildPhase::Publishing);
        let manifest = IndexManifest::new(
            self.embedder.model_id(),
            dimension,
            count,
            self.index_config.metric,
            index.kind(),
        );
        if let Some(dir) = &self.index_dir {
            persistence::persist(dir, &manifest, index.as_ref(), &metadata)?;
        }
        let snapshot = self.snapshots.publish(manifest, index, metadata);

        Ok(BuildReport {
            snapshot_version: snapshot.version,
            model_id: snapshot.manifest.model_id.clone(),
            indexed: count,
            skipped,
            duration_ms: started.elapsed().as_millis() as u64,
            built_at: Utc::now(),
        })
    }

    async fn run_append(
        &self,
        source: &mut (dyn RecordSource + '_),
        started: Instant,
    ) -> Result<BuildReport, BuildError> {
        let current = self.snapshots.current().ok_or(BuildError::NoSnapshot)?;
        if current.manifest.model_id != self.embedder.model_id() {
            return Err(BuildError::ModelMismatch {
                snapshot: current.manifest.model_id.clone(),
                requested: self.embedder.model_id().to_string(),
            });
        }

        let dimension = self.embedder.dimension();
        let mut staged_ids = Vec::new();
        let mut staged_vectors = Vec::new();
        let mut metadata = current.metadata.clone();
        let mut new_rows = MetadataTable::new();
        let mut skipped = Vec::new();

        loop {
            self.set_phase(BuildPhase::Staging);
            if self.abort_requested.load(Ordering::Acquire) {
                return Err(BuildError::Aborted);
            }

            let batch = source
                .next_batch(self.batch_size)
                .await
                .map_err(|e| BuildError::Source(e.to_string()))?;
            if batch.is_empty() {
                break;
            }

            self.set_phase(BuildPhase::Embedding);
            self.embed_batch_into(
                batch,
                &mut staged_ids,
                &mut staged_vectors,
                &mut new_rows,
                &mut skipped,
                |record| !metadata.contains(&record.id),
            );
        }

        self.set_phase(BuildPhase::IndexBuilding);
        let mut index = current.index.boxed_clone();
        let appended = index.append(staged_ids, staged_vectors)?;
        for record in new_rows.iter() {
            metadata.insert(record.clone());
        }

        self.set_phase(BuildPhase::Publishing);
        let manifest = IndexManifest::new(
            self.embedder.model_id(),
            dimension,
            index.len(),
            current.manifest.metric,
            index.kind(),
        );
        if let Some(dir) = &self.index_dir {
            persistence::persist(dir, &manifest, index.as_ref(), &metadata)?;
        }
        let snapshot = self.snapshots.publish(manifest, index, metadata);

        Ok(BuildReport {
            snapshot_version: snapshot.version,
            model_id: snapshot.manifest.model_id.clone(),
            indexed: appended,
            skipped,
            duration_ms: started.elapsed().as_millis() as u64,
            built_at: Utc::now(),
        })
    }

    /// Embed one staged batch, skipping malformed records instead of
    /// failing the build. A batch-level inference failure falls back to
    /// per-record embedding so one bad input cannot take out its
    /// neighbors.
    fn embed_batch_into(
        &self,
        batch: Vec<SegmentRecord>,
        staged_ids: &mut Vec<String>,
        staged_vectors: &mut Vec<Vec<f32>>,
        metadata: &mut MetadataTable,
        skipped: &mut Vec<SkippedRecord>,
        mut admit: impl FnMut(&SegmentRecord) -> bool,
    ) {
        let mut valid: Vec<SegmentRecord> = Vec::with_capacity(batch.len());
        for record in batch {
            if record.id.is_empty() {
                skippable(&record, "empty id", skipped);
                continue;
            }
            if record.text.trim().is_empty() {
                skippable(&record, "empty text", skipped);
                continue;
            }
            if metadata.contains(&record.id) || valid.iter().any(|r| r.id == record.id) {
                skippable(&record, "duplicate id in corpus", skipped);
                continue;
            }
            if !admit(&record) {
                skippable(&record, "already indexed", skipped);
                continue;
            }
            valid.push(record);
        }
        if valid.is_empty() {
            return;
        }

        let texts: Vec<&str> = valid.iter().map(|r| r.text.as_str()).collect();
        match self.embedder.embed_batch(&texts) {
            Ok(vectors) => {
                for (record, vector) in valid.into_iter().zip(vectors) {
                    staged_ids.push(record.id.clone());
                    staged_vectors.push(vector);
                    metadata.insert(record);
                }
            }
            Err(batch_error) => {
                warn!(error = %batch_error, "batch embedding failed, retrying per record");
                for record in valid {
                    match self.embedder.embed(&record.text) {
                        Ok(vector) => {
                            staged_ids.push(record.id.clone());
                            staged_vectors.push(vector);
                            metadata.insert(record);
                        }
                        Err(e) => skippable(&record, &e.to_string(), skipped),
                    }
                }
            }
        }
    }
}

fn skippable(record: &SegmentRecord, reason: &str, skipped: &mut Vec<SkippedRecord>) {
    warn!(id = %record.id, reason, "skipping record");
    skipped.push(SkippedRecord {
        id: record.id.clone(),
        reason: reason.to_string(),
    });
}
