//! Deterministic feature-hashing embedder.
//!
//! Tokenizes on non-alphanumeric boundaries, hashes each token and its
//! character trigrams with FNV-1a, and accumulates signed counts into a
//! fixed-width vector that is then L2-normalized. No model download, no
//! floating-point nondeterminism: the same text always produces the
//! same vector, which is what the test suite and offline deployments
//! need. Retrieval quality is token-overlap only.

use crate::core::EmbeddingError;

use super::{validate_input, TextEmbedder};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Weight applied to character trigram features relative to whole
/// tokens, so near-forms ("pet"/"pets") overlap without swamping exact
/// token matches.
const TRIGRAM_WEIGHT: f32 = 0.5;

pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model_id: format!("feature-hash-v1/{}", dimension),
            dimension,
        }
    }

    fn accumulate(&self, out: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let slot = (hash % self.dimension as u64) as usize;
        // High bit decides the sign so colliding features can cancel
        // instead of always inflating the same slot.
        let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
        out[slot] += sign * weight;
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

impl TextEmbedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        validate_input(text)?;

        let mut out = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            self.accumulate(&mut out, token.as_bytes(), 1.0);

            let chars: Vec<char> = token.chars().collect();
            if chars.len() < 3 {
                continue;
            }
            for window in chars.windows(3) {
                let gram: String = window.iter().collect();
                self.accumulate(&mut out, gram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut out {
                *x /= norm;
            }
        }
        Ok(out)
    }
}
