//! Aggregated usage types
//!
//! Records that share an aggregation key are merged into a single
//! [`AggregatedUsageRecord`] before transmission, and sealed batches of
//! aggregated records travel as a [`UsageBatch`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::usage::SchemaUsageRecord;

/// One aggregated usage entry
///
/// Holds a representative record for its aggregation key together with the
/// number of requests merged into it. Field counts in `type_field_metrics`
/// are sums over all merged records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedUsageRecord {
    /// Representative schema usage for this key
    pub schema_usage: SchemaUsageRecord,
    /// Number of requests merged into this entry
    pub request_count: u64,
}

impl AggregatedUsageRecord {
    /// Create an entry from a single record
    pub fn from_record(record: SchemaUsageRecord) -> Self {
        Self {
            schema_usage: record,
            request_count: 1,
        }
    }

    /// Merge another record with the same aggregation key into this entry
    ///
    /// Increments the request count and folds the record's type field
    /// metrics in: entries with matching field coordinates have their counts
    /// summed, unseen coordinates are appended.
    pub fn merge(&mut self, record: &SchemaUsageRecord) {
        self.request_count += 1;

        for incoming in &record.type_field_metrics {
            match self
                .schema_usage
                .type_field_metrics
                .iter_mut()
                .find(|existing| existing.same_field(incoming))
            {
                Some(existing) => existing.count += incoming.count,
                None => self.schema_usage.type_field_metrics.push(incoming.clone()),
            }
        }
    }
}

/// A sealed batch of aggregated usage records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageBatch {
    /// Batch ID
    pub batch_id: Uuid,
    /// Timestamp when the batch was sealed
    pub created_at: DateTime<Utc>,
    /// Aggregated entries in this batch
    pub entries: Vec<AggregatedUsageRecord>,
}

impl UsageBatch {
    /// Create new batch
    pub fn new(entries: Vec<AggregatedUsageRecord>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            created_at: Utc::now(),
            entries,
        }
    }

    /// Number of aggregated entries in the batch
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total requests represented by this batch
    pub fn request_total(&self) -> u64 {
        self.entries.iter().map(|e| e.request_count).sum()
    }
}
