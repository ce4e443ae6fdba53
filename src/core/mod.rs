pub mod config;
pub mod error;
pub mod types;

pub use config::{
    Config, EmbeddingConfig, HnswConfig, IndexConfig, IndexKindConfig, QueryConfig,
    ServerConfig, StorageConfig,
};
pub use error::{BuildError, ClipseekError, EmbeddingError, IndexError, QueryError};
pub use types::{SearchHit, SegmentId, SegmentRecord, Vector};
