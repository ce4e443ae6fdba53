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

//! # ClipSeek - Semantic Search over Video Transcripts
//!
//! ClipSeek turns transcript segments into dense vector embeddings,
//! maintains a nearest-neighbor index over them, and serves low-latency
//! top-k similarity queries joined back to source metadata.
//!
//! ## Pipeline
//!
//! - **Ingest**: a batch-readable source of `(id, text, metadata)` records
//! - **Build**: embed in batches, build one index over the staged set,
//!   publish an immutable versioned snapshot atomically
//! - **Query**: embed the query with the snapshot's model, overfetch,
//!   join metadata, filter, normalize scores to [0, 1], truncate to k
//!
//! Queries always read the last published snapshot; at most one build
//! runs at a time and a completed build swaps the snapshot reference in
//! a single atomic publish.

pub mod builder;
pub mod compute;
pub mod core;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod query;
pub mod server;
pub mod storage;

pub use crate::core::{ClipseekError, Config};

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::builder::{BuildReport, IndexBuilder};
use crate::core::{BuildError, IndexError};
use crate::embedding::TextEmbedder;
use crate::ingest::JsonlRecordSource;
use crate::query::QueryEngine;
use crate::server::{AppState, RestServer};
use crate::storage::{persistence, SnapshotStore};

/// Main ClipSeek instance wiring the embedder, snapshot store, builder
/// and query engine together.
pub struct Clipseek {
    config: Arc<Config>,
    embedder: Arc<dyn TextEmbedder>,
    snapshots: Arc<SnapshotStore>,
    builder: Arc<IndexBuilder>,
    engine: Arc<QueryEngine>,
    started_at: Instant,
}

impl Clipseek {
    pub fn new(config: Config) -> Result<Self, ClipseekError> {
        let embedder = embedding::embedder_from_config(&config.embedding)?;
        info!(
            model_id = embedder.model_id(),
            dimension = embedder.dimension(),
            "embedder ready"
        );

        let snapshots = Arc::new(SnapshotStore::new());
        let builder = Arc::new(IndexBuilder::new(
            embedder.clone(),
            snapshots.clone(),
            config.index.clone(),
            &config.embedding,
            Some(config.storage.index_dir.clone()),
        ));
        let engine = Arc::new(QueryEngine::new(
            embedder.clone(),
            snapshots.clone(),
            config.query.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            embedder,
            snapshots,
            builder,
            engine,
            started_at: Instant::now(),
        })
    }

    /// Load the persisted snapshot from the index directory, if one
    /// exists. Returns whether a snapshot was published.
    pub fn load_persisted(&self) -> Result<bool, IndexError> {
        let dir = &self.config.storage.index_dir;
        if !persistence::exists(dir) {
            return Ok(false);
        }
        let (manifest, index, metadata) = persistence::load(dir)?;
        if manifest.model_id != self.embedder.model_id() {
            warn!(
                snapshot_model = %manifest.model_id,
                embedder_model = %self.embedder.model_id(),
                "persisted snapshot uses a different model; queries will be rejected until a rebuild"
            );
        }
        self.snapshots.publish(manifest, index, metadata);
        Ok(true)
    }

    /// Run a full rebuild from the configured JSONL corpus.
    pub async fn rebuild_from_corpus(&self) -> Result<BuildReport, BuildError> {
        let mut source = JsonlRecordSource::open(&self.config.storage.corpus_path)
            .map_err(|e| BuildError::Source(e.to_string()))?;
        self.builder.build(&mut source).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> Arc<QueryEngine> {
        self.engine.clone()
    }

    pub fn builder(&self) -> Arc<IndexBuilder> {
        self.builder.clone()
    }

    pub fn snapshots(&self) -> Arc<SnapshotStore> {
        self.snapshots.clone()
    }

    /// Whether the published snapshot has drifted materially behind a
    /// corpus of `corpus_len` records.
    pub fn is_stale(&self, corpus_len: usize) -> bool {
        self.snapshots
            .is_stale(corpus_len, self.config.query.stale_after)
    }

    /// Construct the REST server for this instance.
    pub fn rest_server(&self) -> Result<RestServer, ClipseekError> {
        let bind_addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        )
        .parse()
        .map_err(|e| ClipseekError::Config(format!("invalid bind address: {}", e)))?;

        let state = AppState {
            engine: self.engine.clone(),
            builder: self.builder.clone(),
            snapshots: self.snapshots.clone(),
            config: self.config.clone(),
            started_at: self.started_at,
        };
        Ok(RestServer::new(bind_addr, state))
    }
}
