use thiserror::Error;

use crate::compute::distance::DistanceMetric;

#[derive(Error, Debug)]
pub enum ClipseekError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("empty text cannot be embedded")]
    EmptyText,

    #[error("text exceeds model input limit ({length} > {limit} chars)")]
    TextTooLong { length: usize, limit: usize },

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("corruption detected: {0}")]
    Corrupt(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("id not found in snapshot: {0}")]
    NotFound(String),

    #[error("disk I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("a build is already in progress")]
    InProgress,

    #[error("incremental append requires a published snapshot")]
    NoSnapshot,

    #[error("model mismatch: snapshot built with '{snapshot}', append uses '{requested}'")]
    ModelMismatch { snapshot: String, requested: String },

    #[error("record source error: {0}")]
    Source(String),

    #[error("build aborted before publish")]
    Aborted,

    #[error("index error during build: {0}")]
    Index(#[from] IndexError),

    #[error("embedding error during build: {0}")]
    Embedding(#[from] EmbeddingError),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    Invalid(String),

    #[error("no index snapshot has been published")]
    NoSnapshot,

    #[error("model mismatch: snapshot built with '{snapshot}', query embedder is '{requested}'")]
    ModelMismatch { snapshot: String, requested: String },

    #[error("metric mismatch: snapshot built with {snapshot}, query requested {requested}")]
    MetricMismatch {
        snapshot: DistanceMetric,
        requested: DistanceMetric,
    },

    #[error("query exceeded deadline of {0} ms")]
    Timeout(u64),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}
