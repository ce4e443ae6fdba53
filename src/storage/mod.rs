//! Snapshot state: manifest, metadata join table, on-disk persistence
//! and the atomically swapped current-snapshot handle.

pub mod manifest;
pub mod metadata;
pub mod persistence;
pub mod snapshot;

pub use manifest::{IndexManifest, FORMAT_VERSION};
pub use metadata::MetadataTable;
pub use snapshot::{IndexSnapshot, SnapshotStore};
