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

//! Distance computation and score normalization
//!
//! All kernels return a *distance* (lower = closer) regardless of the
//! underlying metric, so index backends can rank uniformly:
//! - Cosine: `1 - cos(a, b)`
//! - Euclidean: L2 norm
//! - Dot product: negated inner product

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity (ranked by `1 - cosine`)
    Cosine,
    /// Euclidean distance (L2 norm)
    Euclidean,
    /// Dot product similarity (ranked by negated inner product)
    DotProduct,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        DistanceMetric::Cosine
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
            DistanceMetric::DotProduct => write!(f, "dot_product"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" => Ok(DistanceMetric::Euclidean),
            "dot_product" | "dot" => Ok(DistanceMetric::DotProduct),
            other => Err(format!(
                "unknown metric '{}' (expected cosine, euclidean or dot_product)",
                other
            )),
        }
    }
}

/// Compute the distance between two vectors under `metric`.
///
/// Callers guarantee `a.len() == b.len()`; the index backends validate
/// dimensions before reaching this point.
#[inline]
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f32>()
            .sqrt(),
        DistanceMetric::Cosine => {
            let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
            let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

            if norm_a == 0.0 || norm_b == 0.0 {
                1.0
            } else {
                1.0 - (dot / (norm_a * norm_b))
            }
        }
        DistanceMetric::DotProduct => {
            -a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
        }
    }
}

/// Map a raw distance to a bounded score in [0, 1], higher = closer,
/// so clients can apply consistent thresholds across metrics:
/// - cosine similarity `s` maps to `(s + 1) / 2`
/// - euclidean distance `d` maps to `1 / (1 + d)`
/// - dot product `p` maps to the logistic `1 / (1 + e^-p)`
#[inline]
pub fn normalize_score(metric: DistanceMetric, raw_distance: f32) -> f32 {
    let score = match metric {
        DistanceMetric::Cosine => {
            let similarity = 1.0 - raw_distance;
            (similarity + 1.0) / 2.0
        }
        DistanceMetric::Euclidean => 1.0 / (1.0 + raw_distance.max(0.0)),
        DistanceMetric::DotProduct => {
            let product = -raw_distance;
            1.0 / (1.0 + (-product).exp())
        }
    };
    score.clamp(0.0, 1.0)
}
