//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use clipseek::builder::IndexBuilder;
use clipseek::core::{
    EmbeddingConfig, EmbeddingError, IndexConfig, QueryConfig, SegmentRecord,
};
use clipseek::embedding::TextEmbedder;
use clipseek::query::QueryEngine;
use clipseek::storage::SnapshotStore;

/// Deterministic topic-axis embedder: counts keyword occurrences along
/// a few fixed axes so test corpora rank predictably without a model
/// download.
pub struct StubEmbedder {
    model_id: String,
}

const PET_WORDS: &[&str] = &["pet", "cat", "dog", "animal", "puppy", "kitten"];
const TECH_WORDS: &[&str] = &["quantum", "comput", "qubit", "physics", "algorithm"];
const FOOD_WORDS: &[&str] = &["cook", "recipe", "bake", "kitchen"];

impl StubEmbedder {
    pub fn new() -> Self {
        Self::with_model_id("stub-topics-v1")
    }

    pub fn with_model_id(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
        }
    }

    fn axis(text: &str, words: &[&str]) -> f32 {
        words.iter().map(|w| text.matches(w).count() as f32).sum()
    }
}

impl TextEmbedder for StubEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        4
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }
        let lowered = text.to_lowercase();
        let mut v = vec![
            Self::axis(&lowered, PET_WORDS),
            Self::axis(&lowered, TECH_WORDS),
            Self::axis(&lowered, FOOD_WORDS),
            1.0,
        ];
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in &mut v {
            *x /= norm;
        }
        Ok(v)
    }
}

/// The canonical three-record corpus used across tests.
pub fn pet_corpus() -> Vec<SegmentRecord> {
    vec![
        SegmentRecord::new("a", "cats are great pets")
            .with_metadata("title", serde_json::json!("All About Cats"))
            .with_metadata("channel", serde_json::json!("Pets")),
        SegmentRecord::new("b", "dogs are loyal companions")
            .with_metadata("title", serde_json::json!("Dog Training 101"))
            .with_metadata("channel", serde_json::json!("Pets")),
        SegmentRecord::new("c", "quantum computing basics")
            .with_metadata("title", serde_json::json!("Intro to Qubits"))
            .with_metadata("channel", serde_json::json!("Tech")),
    ]
}

pub struct TestStack {
    pub embedder: Arc<dyn TextEmbedder>,
    pub snapshots: Arc<SnapshotStore>,
    pub builder: Arc<IndexBuilder>,
    pub engine: Arc<QueryEngine>,
}

/// Wire an in-memory builder + engine around a shared snapshot store.
pub fn test_stack(embedder: Arc<dyn TextEmbedder>) -> TestStack {
    test_stack_with(embedder, IndexConfig::default(), QueryConfig::default())
}

pub fn test_stack_with(
    embedder: Arc<dyn TextEmbedder>,
    index_config: IndexConfig,
    query_config: QueryConfig,
) -> TestStack {
    let snapshots = Arc::new(SnapshotStore::new());
    let embedding_config = EmbeddingConfig {
        batch_size: 2,
        ..EmbeddingConfig::default()
    };
    let builder = Arc::new(IndexBuilder::new(
        embedder.clone(),
        snapshots.clone(),
        index_config,
        &embedding_config,
        None,
    ));
    let engine = Arc::new(QueryEngine::new(
        embedder.clone(),
        snapshots.clone(),
        query_config,
    ));
    TestStack {
        embedder,
        snapshots,
        builder,
        engine,
    }
}
