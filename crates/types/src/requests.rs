//! RPC payload envelopes
//!
//! Payload structs for the two publish operations of the metrics collector
//! service. The exporter is a producer only; field names follow the service
//! IDL and must not be changed independently.

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregatedUsageRecord;
use crate::usage::SchemaUsageRecord;

/// Payload for publishing pre-aggregated usage metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishAggregatedMetricsRequest {
    /// Aggregated entries, one per distinct aggregation key
    pub aggregation: Vec<AggregatedUsageRecord>,
}

/// Payload for publishing raw, unaggregated usage records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishUsageMetricsRequest {
    /// Raw usage records
    pub schema_usage: Vec<SchemaUsageRecord>,
}

/// Acknowledgement returned by the collector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PublishAck;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::{ClientInfo, OperationInfo, OperationType, RequestInfo, SchemaInfo};

    #[test]
    fn test_aggregated_request_serialization() {
        let record = SchemaUsageRecord::new(
            OperationInfo::new(OperationType::Mutation, "abc", "createUser"),
            ClientInfo::new("admin", "2.1.0"),
            SchemaInfo::new("v7"),
            RequestInfo::new(false, 200),
        );
        let request = PublishAggregatedMetricsRequest {
            aggregation: vec![AggregatedUsageRecord::from_record(record)],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"aggregation\""));
        assert!(json.contains("\"request_count\":1"));
    }

    #[test]
    fn test_usage_request_serialization() {
        let record = SchemaUsageRecord::new(
            OperationInfo::new(OperationType::Query, "def", "me"),
            ClientInfo::new("mobile", "3.0.0"),
            SchemaInfo::new("v7"),
            RequestInfo::new(true, 500),
        );
        let request = PublishUsageMetricsRequest {
            schema_usage: vec![record],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"schema_usage\""));
        assert!(json.contains("\"status_code\":500"));
    }
}
