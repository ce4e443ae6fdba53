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

//! Query engine
//!
//! Turns a text query into ranked hits: validate, embed with the
//! snapshot's model, overfetch candidates when filters will discard
//! some, join metadata, normalize scores to [0, 1] and truncate to k.
//! The snapshot reference is resolved exactly once per request, so a
//! build publishing mid-query never changes what this query sees.

pub mod filters;

pub use filters::{MetadataFilter, FILTERABLE_FIELDS};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::compute::distance::{normalize_score, DistanceMetric};
use crate::core::{QueryConfig, QueryError, SearchHit};
use crate::embedding::TextEmbedder;
use crate::index::{SearchDeadline, VectorIndex};
use crate::storage::SnapshotStore;

/// Upper bound on query text length, matching what the ingestion
/// pipeline accepts for a single segment query.
pub const MAX_QUERY_CHARS: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Must match the metric the active snapshot was built with; a
    /// mismatch is an error, never silently re-scored.
    #[serde(default)]
    pub metric: Option<DistanceMetric>,
    #[serde(default)]
    pub min_score: Option<f32>,
    #[serde(default)]
    pub filters: Vec<MetadataFilter>,
}

fn default_k() -> usize {
    5
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub total: usize,
    /// Snapshot the results were served from, so callers can detect
    /// stale reads across rebuilds.
    pub snapshot_version: u64,
    pub took_ms: f64,
}

pub struct QueryEngine {
    embedder: Arc<dyn TextEmbedder>,
    snapshots: Arc<SnapshotStore>,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        snapshots: Arc<SnapshotStore>,
        config: QueryConfig,
    ) -> Self {
        Self {
            embedder,
            snapshots,
            config,
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, QueryError> {
        let started = Instant::now();
        self.validate(request)?;

        // Resolve the snapshot once and hold it for the whole request.
        let snapshot = self.snapshots.current().ok_or(QueryError::NoSnapshot)?;

        if let Some(requested) = request.metric {
            if requested != snapshot.manifest.metric {
                return Err(QueryError::MetricMismatch {
                    snapshot: snapshot.manifest.metric,
                    requested,
                });
            }
        }
        if self.embedder.model_id() != snapshot.manifest.model_id {
            return Err(QueryError::ModelMismatch {
                snapshot: snapshot.manifest.model_id.clone(),
                requested: self.embedder.model_id().to_string(),
            });
        }

        let deadline = SearchDeadline::after_ms(self.config.timeout_ms);
        let query_vector = self.embedder.embed(&request.query)?;

        // Overfetch so post-retrieval filtering does not under-fill.
        let filtering = request.min_score.is_some() || !request.filters.is_empty();
        let fetch = if filtering {
            request.k.saturating_mul(self.config.overfetch_factor.max(1))
        } else {
            request.k
        };

        let neighbors = snapshot.index.search(&query_vector, fetch, Some(deadline))?;
        let metric = snapshot.manifest.metric;

        let mut hits = Vec::with_capacity(request.k.min(neighbors.len()));
        for neighbor in neighbors {
            // Structural invariant: every id the index returns has a
            // metadata row in the same snapshot.
            let record = snapshot.metadata.get(&neighbor.id)?;

            if !request.filters.iter().all(|f| f.matches(record)) {
                continue;
            }
            let score = normalize_score(metric, neighbor.distance);
            if let Some(min_score) = request.min_score {
                if score < min_score {
                    continue;
                }
            }

            hits.push(SearchHit {
                id: neighbor.id,
                score,
                metadata: record.metadata.clone(),
            });
            if hits.len() == request.k {
                break;
            }
        }

        let took_ms = started.elapsed().as_secs_f64() * 1_000.0;
        debug!(
            query = %request.query,
            k = request.k,
            hits = hits.len(),
            snapshot_version = snapshot.version,
            took_ms,
            "search complete"
        );

        Ok(SearchResponse {
            query: request.query.clone(),
            total: hits.len(),
            hits,
            snapshot_version: snapshot.version,
            took_ms,
        })
    }

    fn validate(&self, request: &SearchRequest) -> Result<(), QueryError> {
        if request.query.trim().is_empty() {
            return Err(QueryError::Invalid("query text is empty".into()));
        }
        let length = request.query.chars().count();
        if length > MAX_QUERY_CHARS {
            return Err(QueryError::Invalid(format!(
                "query is {} chars, maximum is {}",
                length, MAX_QUERY_CHARS
            )));
        }
        if request.k < 1 || request.k > self.config.max_k {
            return Err(QueryError::Invalid(format!(
                "k must be between 1 and {}, got {}",
                self.config.max_k, request.k
            )));
        }
        if let Some(min_score) = request.min_score {
            if !(0.0..=1.0).contains(&min_score) {
                return Err(QueryError::Invalid(format!(
                    "min_score must be within [0, 1], got {}",
                    min_score
                )));
            }
        }
        filters::validate_all(&request.filters)
    }
}
