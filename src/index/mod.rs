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

//! Vector index backends
//!
//! Two backends implement the same `VectorIndex` contract:
//! - `FlatIndex`: exact brute-force scan, guaranteed true top-k.
//! - `HnswIndex`: approximate graph search, no recall guarantee.
//!
//! `select_kind` picks between them by corpus size unless the
//! configuration pins one; callers inspect `exact()` to know which
//! guarantee they are getting.

pub mod flat;
pub mod hnsw;

pub use flat::FlatIndex;
pub use hnsw::HnswIndex;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::compute::distance::DistanceMetric;
use crate::core::{IndexConfig, IndexError, IndexKindConfig, QueryError, SegmentId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Flat,
    Hnsw,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Flat => write!(f, "flat"),
            IndexKind::Hnsw => write!(f, "hnsw"),
        }
    }
}

/// A nearest-neighbor candidate, raw distance attached (lower = closer).
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: SegmentId,
    pub distance: f32,
}

/// Cooperative deadline handed into searches; checked at natural loop
/// boundaries rather than preempting the scan.
#[derive(Debug, Clone, Copy)]
pub struct SearchDeadline {
    pub expires_at: Instant,
    pub budget_ms: u64,
}

impl SearchDeadline {
    pub fn after_ms(budget_ms: u64) -> Self {
        Self {
            expires_at: Instant::now() + std::time::Duration::from_millis(budget_ms),
            budget_ms,
        }
    }

    #[inline]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn check(&self) -> Result<(), QueryError> {
        if self.expired() {
            Err(QueryError::Timeout(self.budget_ms))
        } else {
            Ok(())
        }
    }
}

pub trait VectorIndex: Send + Sync {
    fn kind(&self) -> IndexKind;

    /// Whether results are the guaranteed true top-k (brute force) or
    /// approximate (graph search).
    fn exact(&self) -> bool;

    fn metric(&self) -> DistanceMetric;

    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return at most `k` nearest neighbors by the index metric,
    /// nearest first, ties broken by ascending id. An empty index
    /// returns an empty sequence, never an error.
    fn search(
        &self,
        query: &[f32],
        k: usize,
        deadline: Option<SearchDeadline>,
    ) -> Result<Vec<Neighbor>, QueryError>;

    /// Insert additional vectors. Both shipped backends support
    /// insertion; ids must not already be present (the builder
    /// deduplicates against the snapshot before calling).
    fn append(
        &mut self,
        ids: Vec<SegmentId>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize, IndexError>;

    /// Serialize the structure for the snapshot blob.
    fn encode(&self) -> Result<Vec<u8>, IndexError>;

    fn boxed_clone(&self) -> Box<dyn VectorIndex>;
}

/// Pick a backend for a corpus of `count` vectors. Below the exact
/// threshold the ANN structure-build overhead is not justified.
pub fn select_kind(config: &IndexConfig, count: usize) -> IndexKind {
    match config.kind {
        IndexKindConfig::Flat => IndexKind::Flat,
        IndexKindConfig::Hnsw => IndexKind::Hnsw,
        IndexKindConfig::Auto => {
            if count < config.exact_threshold {
                IndexKind::Flat
            } else {
                IndexKind::Hnsw
            }
        }
    }
}

/// Construct an index of the selected kind over the staged rows.
/// Accepts zero rows: the result is an empty, valid, queryable index.
pub fn build_index(
    config: &IndexConfig,
    dimension: usize,
    ids: Vec<SegmentId>,
    vectors: Vec<Vec<f32>>,
) -> Result<Box<dyn VectorIndex>, IndexError> {
    match select_kind(config, ids.len()) {
        IndexKind::Flat => Ok(Box::new(FlatIndex::from_rows(
            config.metric,
            dimension,
            ids,
            vectors,
        )?)),
        IndexKind::Hnsw => Ok(Box::new(HnswIndex::from_rows(
            config.metric,
            dimension,
            &config.hnsw,
            ids,
            vectors,
        )?)),
    }
}

/// Deserialize a snapshot blob back into the backend named by the
/// manifest.
pub fn decode_index(kind: IndexKind, bytes: &[u8]) -> Result<Box<dyn VectorIndex>, IndexError> {
    match kind {
        IndexKind::Flat => {
            let index: FlatIndex = bincode::deserialize(bytes)
                .map_err(|e| IndexError::Corrupt(format!("flat index blob: {}", e)))?;
            Ok(Box::new(index))
        }
        IndexKind::Hnsw => {
            let index: HnswIndex = bincode::deserialize(bytes)
                .map_err(|e| IndexError::Corrupt(format!("hnsw index blob: {}", e)))?;
            Ok(Box::new(index))
        }
    }
}
