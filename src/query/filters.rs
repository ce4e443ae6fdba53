//! Typed metadata filter predicates.
//!
//! A small closed set — equality, set membership, numeric range —
//! evaluated against the metadata row of each candidate. Unknown
//! filter fields are rejected up front rather than silently ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{QueryError, SegmentRecord};

/// Fields filters may reference: the record id plus the well-known
/// metadata keys the ingestion pipeline emits.
pub const FILTERABLE_FIELDS: &[&str] = &[
    "id",
    "title",
    "channel",
    "channel_id",
    "published_at",
    "view_count",
    "duration",
    "start_time",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetadataFilter {
    Equals { field: String, value: Value },
    OneOf { field: String, values: Vec<Value> },
    Range {
        field: String,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

impl MetadataFilter {
    pub fn field(&self) -> &str {
        match self {
            MetadataFilter::Equals { field, .. } => field,
            MetadataFilter::OneOf { field, .. } => field,
            MetadataFilter::Range { field, .. } => field,
        }
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        let field = self.field();
        if !FILTERABLE_FIELDS.contains(&field) {
            return Err(QueryError::Invalid(format!(
                "unknown filter field '{}' (allowed: {})",
                field,
                FILTERABLE_FIELDS.join(", ")
            )));
        }
        if let MetadataFilter::Range { min: None, max: None, .. } = self {
            return Err(QueryError::Invalid(format!(
                "range filter on '{}' needs at least one bound",
                field
            )));
        }
        Ok(())
    }

    pub fn matches(&self, record: &SegmentRecord) -> bool {
        match self {
            MetadataFilter::Equals { field, value } => {
                field_value(record, field).map_or(false, |v| value_eq(&v, value))
            }
            MetadataFilter::OneOf { field, values } => field_value(record, field)
                .map_or(false, |v| values.iter().any(|candidate| value_eq(&v, candidate))),
            MetadataFilter::Range { field, min, max } => {
                let Some(number) = field_value(record, field).and_then(|v| as_number(&v)) else {
                    return false;
                };
                min.map_or(true, |lo| number >= lo) && max.map_or(true, |hi| number <= hi)
            }
        }
    }
}

pub fn validate_all(filters: &[MetadataFilter]) -> Result<(), QueryError> {
    for filter in filters {
        filter.validate()?;
    }
    Ok(())
}

fn field_value(record: &SegmentRecord, field: &str) -> Option<Value> {
    if field == "id" {
        return Some(Value::String(record.id.clone()));
    }
    record.metadata.get(field).cloned()
}

/// Equality that treats 42 and 42.0 as the same number; everything
/// else is strict JSON equality.
fn value_eq(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
