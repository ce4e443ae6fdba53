//! Record sources feeding the index builder.
//!
//! The builder never initiates network calls: the ingestion
//! collaborators materialize transcript segments into a batch-readable
//! source and the builder only consumes what is handed to it.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::core::SegmentRecord;

#[async_trait]
pub trait RecordSource: Send {
    /// Return up to `max` records; an empty batch signals exhaustion.
    async fn next_batch(&mut self, max: usize) -> anyhow::Result<Vec<SegmentRecord>>;
}

/// Reads one JSON-encoded `SegmentRecord` per line. Unparseable lines
/// are skipped with a warning so one bad row cannot sink a rebuild.
pub struct JsonlRecordSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl JsonlRecordSource {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|e| anyhow::anyhow!("cannot open corpus {}: {}", path.display(), e))?;
        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

#[async_trait]
impl RecordSource for JsonlRecordSource {
    async fn next_batch(&mut self, max: usize) -> anyhow::Result<Vec<SegmentRecord>> {
        let mut batch = Vec::with_capacity(max);
        while batch.len() < max {
            let Some(line) = self.lines.next() else {
                break;
            };
            self.line_no += 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SegmentRecord>(&line) {
                Ok(record) => batch.push(record),
                Err(e) => {
                    warn!(
                        corpus = %self.path.display(),
                        line = self.line_no,
                        error = %e,
                        "skipping unparseable corpus line"
                    );
                }
            }
        }
        Ok(batch)
    }
}

/// In-memory source for tests and API-fed rebuilds.
pub struct VecRecordSource {
    records: VecDeque<SegmentRecord>,
}

impl VecRecordSource {
    pub fn new(records: Vec<SegmentRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }
}

#[async_trait]
impl RecordSource for VecRecordSource {
    async fn next_batch(&mut self, max: usize) -> anyhow::Result<Vec<SegmentRecord>> {
        let take = max.min(self.records.len());
        Ok(self.records.drain(..take).collect())
    }
}
