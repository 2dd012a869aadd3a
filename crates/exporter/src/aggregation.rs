//! In-memory aggregation
//!
//! Records drained from the queue are merged into an [`AggregationMap`]
//! keyed by a precomputed string fingerprint. The map is owned exclusively
//! by the batch worker; ownership of its contents moves to a dispatcher only
//! as a sealed batch.

use std::collections::HashMap;
use std::fmt;

use graphql_metrics_types::{AggregatedUsageRecord, SchemaUsageRecord};

/// Separator between fingerprint fields. Control characters keep arbitrary
/// attribute values from colliding with field boundaries.
const FIELD_SEPARATOR: char = '\u{1f}';

/// Separator between an attribute key and its value.
const PAIR_SEPARATOR: char = '\u{1e}';

/// Fingerprint identifying records that are eligible to be merged
///
/// Built once per record from the operation hash, client identity, schema
/// version, request outcome, and the canonicalized attribute map. Equal
/// fingerprints mean equal aggregation keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregationKey(String);

impl AggregationKey {
    /// Compute the fingerprint for a record
    pub fn from_record(record: &SchemaUsageRecord) -> Self {
        let mut parts = String::new();
        for field in [
            record.operation.hash.as_str(),
            record.client.name.as_str(),
            record.client.version.as_str(),
            record.schema.version.as_str(),
        ] {
            parts.push_str(field);
            parts.push(FIELD_SEPARATOR);
        }
        parts.push_str(if record.request.error { "1" } else { "0" });
        parts.push(FIELD_SEPARATOR);
        parts.push_str(&record.request.status_code.to_string());

        // Attribute insertion order must not influence the key.
        let mut attributes: Vec<_> = record.attributes.iter().collect();
        attributes.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in attributes {
            parts.push(FIELD_SEPARATOR);
            parts.push_str(key);
            parts.push(PAIR_SEPARATOR);
            parts.push_str(value);
        }

        Self(parts)
    }

    /// Get the fingerprint as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The batch worker's in-progress aggregation state
#[derive(Debug, Default)]
pub(crate) struct AggregationMap {
    entries: HashMap<AggregationKey, AggregatedUsageRecord>,
}

impl AggregationMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Merge a record into the map
    pub(crate) fn insert(&mut self, record: SchemaUsageRecord) {
        let key = AggregationKey::from_record(&record);
        match self.entries.get_mut(&key) {
            Some(entry) => entry.merge(&record),
            None => {
                self.entries
                    .insert(key, AggregatedUsageRecord::from_record(record));
            }
        }
    }

    /// Number of distinct aggregation keys currently held
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take all entries, leaving the map empty for the next batch
    pub(crate) fn seal(&mut self) -> Vec<AggregatedUsageRecord> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }
}
