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

//! Text embedding generation
//!
//! `TextEmbedder` is the seam between the pipeline and whichever model
//! produces the vectors. Two implementations ship with the crate:
//! - `FastEmbedder` (feature `fastembed`): local ONNX sentence
//!   embeddings, one-time model load per process.
//! - `HashingEmbedder`: deterministic token feature hashing, no model
//!   download, used for tests and offline deployments.
//!
//! Embedding is deterministic for a fixed model identifier: same text,
//! same model, same vector.

#[cfg(feature = "fastembed")]
pub mod fastembed;
pub mod hashing;

#[cfg(feature = "fastembed")]
pub use self::fastembed::FastEmbedder;
pub use hashing::HashingEmbedder;

use std::sync::Arc;

use crate::core::{EmbeddingConfig, EmbeddingError};

/// Maximum input length accepted by any embedder, in characters.
/// Pretrained models truncate internally well below this; the bound
/// exists so a runaway transcript fails loudly instead of silently.
pub const MAX_INPUT_CHARS: usize = 8_192;

pub trait TextEmbedder: Send + Sync {
    /// Model identifier recorded in snapshot manifests. Vectors from
    /// different identifiers must never share an index.
    fn model_id(&self) -> &str;

    /// Output dimension, fixed for the lifetime of the model.
    fn dimension(&self) -> usize;

    /// Embed a single text passage.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch of passages. The default forwards to `embed`;
    /// adapters with a native batch path override this for throughput.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Reject input the models cannot meaningfully embed.
pub(crate) fn validate_input(text: &str) -> Result<(), EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyText);
    }
    let length = text.chars().count();
    if length > MAX_INPUT_CHARS {
        return Err(EmbeddingError::TextTooLong {
            length,
            limit: MAX_INPUT_CHARS,
        });
    }
    Ok(())
}

/// Construct the embedder named by the configuration.
///
/// `feature-hash-v1` (or any id with that prefix) selects the offline
/// hashing embedder; anything else resolves against the pretrained
/// model catalog when the `fastembed` feature is enabled.
pub fn embedder_from_config(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn TextEmbedder>, EmbeddingError> {
    if config.model_id.starts_with("feature-hash") {
        return Ok(Arc::new(HashingEmbedder::new(config.dimension)));
    }

    #[cfg(feature = "fastembed")]
    {
        Ok(Arc::new(FastEmbedder::load(&config.model_id)?))
    }

    #[cfg(not(feature = "fastembed"))]
    {
        tracing::warn!(
            model_id = %config.model_id,
            "built without the fastembed feature, falling back to the hashing embedder"
        );
        Ok(Arc::new(HashingEmbedder::new(config.dimension)))
    }
}
