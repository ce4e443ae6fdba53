use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::compute::distance::DistanceMetric;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Directory holding manifest.json, vectors.bin and metadata.bin.
    pub index_dir: PathBuf,
    /// JSONL corpus consumed by the rebuild endpoint.
    pub corpus_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model identifier, recorded in the snapshot manifest.
    /// `feature-hash-v1` selects the deterministic offline embedder.
    pub model_id: String,
    pub batch_size: usize,
    /// Output dimension for the feature-hashing embedder. Pretrained
    /// models carry their own dimension.
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub metric: DistanceMetric,
    /// "auto" picks flat below `exact_threshold` and hnsw above;
    /// "flat" / "hnsw" pin the backend.
    pub kind: IndexKindConfig,
    pub exact_threshold: usize,
    pub hnsw: HnswConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexKindConfig {
    Auto,
    Flat,
    Hnsw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Maximum connections per node in the base layer.
    pub m: usize,
    /// Candidate list size during construction.
    pub ef_construction: usize,
    /// Candidate list size during search.
    pub ef_search: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_k: usize,
    /// Candidate multiplier applied when filters or min_score are
    /// present, so post-retrieval filtering does not under-fill results.
    pub overfetch_factor: usize,
    pub timeout_ms: u64,
    /// Corpus growth (in records) beyond the published vector count
    /// after which the snapshot is considered stale.
    pub stale_after: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            index_dir: PathBuf::from("./data/index"),
            corpus_path: PathBuf::from("./data/corpus.jsonl"),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "all-MiniLM-L6-v2".to_string(),
            batch_size: 32,
            dimension: 384,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Cosine,
            kind: IndexKindConfig::Auto,
            exact_threshold: 50_000,
            hnsw: HnswConfig::default(),
        }
    }
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_k: 50,
            overfetch_factor: 4,
            timeout_ms: 5_000,
            stale_after: 1_000,
        }
    }
}
