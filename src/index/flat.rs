//! Exact brute-force index.
//!
//! Vectors live in one contiguous row-major buffer; a search scans
//! every row, so results are the guaranteed true top-k under the
//! configured metric. Preferred below the configured corpus-size
//! threshold where ANN build overhead buys nothing.

use serde::{Deserialize, Serialize};

use crate::compute::distance::{self, DistanceMetric};
use crate::core::{IndexError, QueryError, SegmentId};

use super::{IndexKind, Neighbor, SearchDeadline, VectorIndex};

/// Rows scanned between deadline checks.
const DEADLINE_STRIDE: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    metric: DistanceMetric,
    dimension: usize,
    ids: Vec<SegmentId>,
    /// Row-major vector data, `ids.len() * dimension` floats.
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(metric: DistanceMetric, dimension: usize) -> Self {
        Self {
            metric,
            dimension,
            ids: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn from_rows(
        metric: DistanceMetric,
        dimension: usize,
        ids: Vec<SegmentId>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        let mut index = Self::new(metric, dimension);
        index.append(ids, vectors)?;
        Ok(index)
    }

    #[inline]
    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dimension..(i + 1) * self.dimension]
    }
}

impl VectorIndex for FlatIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }

    fn exact(&self) -> bool {
        true
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
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, usize)> = Vec::with_capacity(self.ids.len());
        for i in 0..self.ids.len() {
            if i % DEADLINE_STRIDE == 0 {
                if let Some(d) = &deadline {
                    d.check()?;
                }
            }
            scored.push((distance::distance(self.metric, query, self.row(i)), i));
        }

        scored.sort_unstable_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| self.ids[a.1].cmp(&self.ids[b.1]))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(dist, i)| Neighbor {
                id: self.ids[i].clone(),
                distance: dist,
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
        self.data.reserve(appended * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(&vector);
        }
        self.ids.extend(ids);
        Ok(appended)
    }

    fn encode(&self) -> Result<Vec<u8>, IndexError> {
        bincode::serialize(self).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    fn boxed_clone(&self) -> Box<dyn VectorIndex> {
        Box::new(self.clone())
    }
}
