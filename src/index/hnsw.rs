// Copyright 2025 ClipSeek
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! HNSW (Hierarchical Navigable Small World) index
//!
//! Approximate graph-based search: layered greedy descent from an
//! entry point, candidate expansion at the base layer. Trades recall
//! for speed; used above the exact-search corpus threshold.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::compute::distance::{self, DistanceMetric};
use crate::core::{HnswConfig, IndexError, QueryError, SegmentId};

use super::{IndexKind, Neighbor, SearchDeadline, VectorIndex};

/// Hard cap on graph height; levels are sampled geometrically so real
/// corpora stay far below this.
const MAX_LAYERS: usize = 16;

/// One graph layer: adjacency lists keyed by row index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Layer {
    connections: HashMap<usize, Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswIndex {
    metric: DistanceMetric,
    dimension: usize,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    ids: Vec<SegmentId>,
    rows: Vec<Vec<f32>>,
    layers: Vec<Layer>,
    /// Node in the highest populated layer where searches start.
    entry: Option<usize>,
}

/// Search candidate ordered by distance, row index as the tiebreaker
/// inside the heaps. Final id ordering happens once per search.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    distance: f32,
    row: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.row.cmp(&other.row))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl HnswIndex {
    pub fn new(metric: DistanceMetric, dimension: usize, config: &HnswConfig) -> Self {
        Self {
            metric,
            dimension,
            m: config.m,
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
            ids: Vec::new(),
            rows: Vec::new(),
            layers: Vec::new(),
            entry: None,
        }
    }

    pub fn from_rows(
        metric: DistanceMetric,
        dimension: usize,
        config: &HnswConfig,
        ids: Vec<SegmentId>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        let mut index = Self::new(metric, dimension, config);
        index.append(ids, vectors)?;
        Ok(index)
    }

    fn random_level(&self) -> usize {
        let p = 1.0 / self.m as f64;
        let mut level = 0;
        while level < MAX_LAYERS - 1 && rand::random::<f64>() < p {
            level += 1;
        }
        level
    }

    #[inline]
    fn dist(&self, query: &[f32], row: usize) -> f32 {
        distance::distance(self.metric, query, &self.rows[row])
    }

    fn ensure_layers(&mut self, level: usize) {
        while self.layers.len() <= level {
            self.layers.push(Layer::default());
        }
    }

    /// Greedy candidate expansion within one layer: a min-heap of
    /// frontier candidates against a bounded max-heap of best results.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[usize],
        ef: usize,
        layer: usize,
        deadline: Option<&SearchDeadline>,
    ) -> Result<Vec<Candidate>, QueryError> {
        let mut visited: HashSet<usize> = HashSet::new();
        let mut frontier: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

        for &ep in entry_points {
            if ep < self.rows.len() && visited.insert(ep) {
                let candidate = Candidate {
                    distance: self.dist(query, ep),
                    row: ep,
                };
                frontier.push(Reverse(candidate));
                results.push(candidate);
            }
        }

        while let Some(Reverse(current)) = frontier.pop() {
            if let Some(d) = deadline {
                d.check()?;
            }

            if results.len() >= ef {
                if let Some(worst) = results.peek() {
                    if current.distance > worst.distance {
                        break;
                    }
                }
            }

            let neighbors = self.layers[layer]
                .connections
                .get(&current.row)
                .map(|v| v.as_slice())
                .unwrap_or(&[]);

            for &neighbor in neighbors {
                if !visited.insert(neighbor) {
                    continue;
                }
                let candidate = Candidate {
                    distance: self.dist(query, neighbor),
                    row: neighbor,
                };
                if results.len() < ef {
                    frontier.push(Reverse(candidate));
                    results.push(candidate);
                } else if let Some(worst) = results.peek() {
                    if candidate < *worst {
                        frontier.push(Reverse(candidate));
                        results.push(candidate);
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<Candidate> = results.into_vec();
        out.sort_unstable();
        out.truncate(ef);
        Ok(out)
    }

    fn add_connection(&mut self, from: usize, to: usize, layer: usize) {
        let forward = self.layers[layer].connections.entry(from).or_default();
        if !forward.contains(&to) {
            forward.push(to);
        }
        let backward = self.layers[layer].connections.entry(to).or_default();
        if !backward.contains(&from) {
            backward.push(from);
        }
    }

    /// Keep only the `m` nearest connections of `node`, dropping the
    /// back-references of pruned edges.
    fn prune_connections(&mut self, node: usize, layer: usize) {
        let Some(connections) = self.layers[layer].connections.get(&node) else {
            return;
        };
        if connections.len() <= self.m {
            return;
        }

        let node_vector = self.rows[node].clone();
        let mut ranked: Vec<Candidate> = connections
            .iter()
            .map(|&c| Candidate {
                distance: self.dist(&node_vector, c),
                row: c,
            })
            .collect();
        ranked.sort_unstable();

        let keep: Vec<usize> = ranked.iter().take(self.m).map(|c| c.row).collect();
        let dropped: Vec<usize> = ranked.iter().skip(self.m).map(|c| c.row).collect();

        self.layers[layer].connections.insert(node, keep);
        for conn in dropped {
            if let Some(back) = self.layers[layer].connections.get_mut(&conn) {
                back.retain(|&c| c != node);
            }
        }
    }

    fn insert(&mut self, row: usize) {
        let level = self.random_level();
        let top_before = self.layers.len();
        self.ensure_layers(level);

        let Some(entry) = self.entry else {
            self.entry = Some(row);
            return;
        };

        let vector = self.rows[row].clone();
        let mut entry_points = vec![entry];

        // Greedy descent through layers above the node's level.
        for lc in ((level + 1)..top_before).rev() {
            let found = self
                .search_layer(&vector, &entry_points, 1, lc, None)
                .expect("layer search without a deadline is infallible");
            if let Some(best) = found.first() {
                entry_points = vec![best.row];
            }
        }

        // Connect at every layer from the node's level down to base.
        let connect_top = level.min(top_before.saturating_sub(1));
        for lc in (0..=connect_top).rev() {
            let candidates = self
                .search_layer(&vector, &entry_points, self.ef_construction, lc, None)
                .expect("layer search without a deadline is infallible");

            let selected: Vec<usize> =
                candidates.iter().take(self.m).map(|c| c.row).collect();
            for neighbor in &selected {
                self.add_connection(row, *neighbor, lc);
            }

            entry_points = self.layers[lc]
                .connections
                .get(&row)
                .cloned()
                .unwrap_or_default();

            self.prune_connections(row, lc);
            for neighbor in selected {
                self.prune_connections(neighbor, lc);
            }
        }

        if level + 1 > top_before {
            self.entry = Some(row);
        }
    }
}

impl VectorIndex for HnswIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Hnsw
    }

    fn exact(&self) -> bool {
        false
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        deadline: Option<SearchDeadline>,
    ) -> Result<Vec<Neighbor>, QueryError> {
        if query.len() != self.dimension {
            return Err(QueryError::Index(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            }));
        }
        let Some(entry) = self.entry else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut entry_points = vec![entry];
        for lc in (1..self.layers.len()).rev() {
            let found = self.search_layer(query, &entry_points, 1, lc, deadline.as_ref())?;
            if let Some(best) = found.first() {
                entry_points = vec![best.row];
            }
        }

        let ef = self.ef_search.max(k);
        let mut candidates =
            self.search_layer(query, &entry_points, ef, 0, deadline.as_ref())?;

        // Ascending distance, then ascending id for determinism.
        candidates.sort_unstable_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| self.ids[a.row].cmp(&self.ids[b.row]))
        });
        candidates.truncate(k);

        Ok(candidates
            .into_iter()
            .map(|c| Neighbor {
                id: self.ids[c.row].clone(),
                distance: c.distance,
            })
            .collect())
    }

    fn append(
        &mut self,
        ids: Vec<SegmentId>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize, IndexError> {
        debug_assert_eq!(ids.len(), vectors.len());
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        let appended = ids.len();
        for (id, vector) in ids.into_iter().zip(vectors) {
            let row = self.rows.len();
            self.ids.push(id);
            self.rows.push(vector);
            self.insert(row);
        }
        Ok(appended)
    }

    fn encode(&self) -> Result<Vec<u8>, IndexError> {
        bincode::serialize(self).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    fn boxed_clone(&self) -> Box<dyn VectorIndex> {
        Box::new(self.clone())
    }
}
