//! Build outcome reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::SegmentId;

/// A record the builder dropped rather than aborting the whole build.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub id: SegmentId,
    pub reason: String,
}

/// Summary of one completed build or append, enumerating every skipped
/// id and its failure reason so operators can diagnose without
/// re-running the build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub snapshot_version: u64,
    pub model_id: String,
    pub indexed: usize,
    pub skipped: Vec<SkippedRecord>,
    pub duration_ms: u64,
    pub built_at: DateTime<Utc>,
}
