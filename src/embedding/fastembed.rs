//! Local sentence-embedding adapter over the `fastembed` crate.
//!
//! Model weights are fetched and loaded once per process; the session
//! is shared behind a mutex across all embedding calls. A transient
//! load failure is retried once before surfacing.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::core::EmbeddingError;

use super::{validate_input, TextEmbedder};

pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    model_id: String,
    dimension: usize,
}

impl FastEmbedder {
    /// Load the pretrained model named by `model_id`. Identifiers match
    /// the sentence-transformers naming the corpus pipeline uses.
    pub fn load(model_id: &str) -> Result<Self, EmbeddingError> {
        let model_kind = resolve_model(model_id)?;
        let dimension = TextEmbedding::get_model_info(&model_kind)
            .map_err(|e| EmbeddingError::ModelLoad(e.to_string()))?
            .dim;

        info!(model_id, dimension, "loading embedding model");

        let model = match try_init(model_kind.clone()) {
            Ok(model) => model,
            Err(first) => {
                // One retry covers transient download/IO failures.
                warn!(model_id, error = %first, "model load failed, retrying once");
                try_init(model_kind)?
            }
        };

        Ok(Self {
            model: Mutex::new(model),
            model_id: model_id.to_string(),
            dimension,
        })
    }
}

fn try_init(model_kind: EmbeddingModel) -> Result<TextEmbedding, EmbeddingError> {
    TextEmbedding::try_new(InitOptions::new(model_kind).with_show_download_progress(false))
        .map_err(|e| EmbeddingError::ModelLoad(e.to_string()))
}

fn resolve_model(model_id: &str) -> Result<EmbeddingModel, EmbeddingError> {
    match model_id {
        "all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-MiniLM-L12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        other => Err(EmbeddingError::ModelLoad(format!(
            "unknown model '{}' (supported: all-MiniLM-L6-v2, all-MiniLM-L12-v2, \
             bge-small-en-v1.5, bge-base-en-v1.5)",
            other
        ))),
    }
}

impl TextEmbedder for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        validate_input(text)?;
        let mut vectors = self
            .model
            .lock()
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Inference("model returned no vector".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        for text in texts {
            validate_input(text)?;
        }
        let documents: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let vectors = self
            .model
            .lock()
            .embed(documents, None)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Inference(format!(
                "model returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}
