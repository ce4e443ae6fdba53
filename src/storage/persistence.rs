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

//! On-disk snapshot persistence
//!
//! Layout inside the index directory:
//! - `manifest.json` — model id, dimension, count, metric, kind, timestamp
//! - `vectors.bin`   — crc32-framed bincode of the index structure
//! - `metadata.bin`  — crc32-framed bincode of the metadata table
//!
//! All three are staged as `*.tmp` and renamed together so a crash
//! mid-write never leaves a half-replaced snapshot. `load` verifies the
//! frame lengths, checksums and manifest agreement before handing back
//! a snapshot; any disagreement is `IndexError::Corrupt`.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::core::IndexError;
use crate::index::{decode_index, VectorIndex};

use super::manifest::IndexManifest;
use super::metadata::MetadataTable;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "metadata.bin";

/// Frame a payload as `[crc32: u32-le][len: u64-le][payload]`.
fn frame(payload: &[u8]) -> Vec<u8> {
    let crc = crc32fast::hash(payload);
    let mut out = Vec::with_capacity(payload.len() + 12);
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn unframe(bytes: &[u8], what: &str) -> Result<Vec<u8>, IndexError> {
    if bytes.len() < 12 {
        return Err(IndexError::Corrupt(format!(
            "{} truncated: {} bytes is smaller than the frame header",
            what,
            bytes.len()
        )));
    }
    let crc = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let len = u64::from_le_bytes([
        bytes[4], bytes[5], bytes[6], bytes[7], bytes[8], bytes[9], bytes[10], bytes[11],
    ]) as usize;

    let payload = &bytes[12..];
    if payload.len() != len {
        return Err(IndexError::Corrupt(format!(
            "{} truncated: frame declares {} payload bytes, found {}",
            what,
            len,
            payload.len()
        )));
    }
    if crc32fast::hash(payload) != crc {
        return Err(IndexError::Corrupt(format!("{} checksum mismatch", what)));
    }
    Ok(payload.to_vec())
}

/// Write the manifest + index + metadata trio atomically: stage every
/// file as `.tmp` first, then rename all three.
pub fn persist(
    dir: &Path,
    manifest: &IndexManifest,
    index: &dyn VectorIndex,
    metadata: &MetadataTable,
) -> Result<(), IndexError> {
    fs::create_dir_all(dir)?;

    let manifest_json = manifest.to_json()?;
    let index_blob = frame(&index.encode()?);
    let metadata_blob = frame(
        &bincode::serialize(metadata).map_err(|e| IndexError::Serialization(e.to_string()))?,
    );

    let staged = [
        (MANIFEST_FILE, manifest_json.into_bytes()),
        (VECTORS_FILE, index_blob),
        (METADATA_FILE, metadata_blob),
    ];

    for (name, bytes) in &staged {
        let tmp = dir.join(format!("{}.tmp", name));
        fs::write(&tmp, bytes)?;
    }
    for (name, _) in &staged {
        fs::rename(dir.join(format!("{}.tmp", name)), dir.join(name))?;
    }

    info!(
        dir = %dir.display(),
        vectors = manifest.vector_count,
        kind = %manifest.index_kind,
        "persisted index snapshot"
    );
    Ok(())
}

/// Load a persisted snapshot, verifying checksums and manifest
/// agreement. Returns the parts; the caller publishes them through the
/// snapshot store.
pub fn load(
    dir: &Path,
) -> Result<(IndexManifest, Box<dyn VectorIndex>, MetadataTable), IndexError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let manifest = IndexManifest::from_json(&fs::read_to_string(&manifest_path)?)?;

    let index_bytes = unframe(&fs::read(dir.join(VECTORS_FILE))?, "vector blob")?;
    let index = decode_index(manifest.index_kind, &index_bytes)?;

    let metadata_bytes = unframe(&fs::read(dir.join(METADATA_FILE))?, "metadata blob")?;
    let metadata: MetadataTable = bincode::deserialize(&metadata_bytes)
        .map_err(|e| IndexError::Corrupt(format!("metadata blob: {}", e)))?;

    if index.dimension() != manifest.dimension {
        return Err(IndexError::Corrupt(format!(
            "manifest dimension {} disagrees with stored vector width {}",
            manifest.dimension,
            index.dimension()
        )));
    }
    if index.len() != manifest.vector_count {
        return Err(IndexError::Corrupt(format!(
            "manifest vector count {} disagrees with stored count {}",
            manifest.vector_count,
            index.len()
        )));
    }
    if metadata.len() != index.len() {
        return Err(IndexError::Corrupt(format!(
            "metadata row count {} disagrees with vector count {}",
            metadata.len(),
            index.len()
        )));
    }

    debug!(
        dir = %dir.display(),
        vectors = manifest.vector_count,
        model_id = %manifest.model_id,
        "loaded index snapshot"
    );
    Ok((manifest, index, metadata))
}

/// Whether a snapshot has been persisted at `dir`.
pub fn exists(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).is_file()
        && dir.join(VECTORS_FILE).is_file()
        && dir.join(METADATA_FILE).is_file()
}
