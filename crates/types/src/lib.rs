//! Data model for GraphQL schema usage metrics
//!
//! This crate provides the wire-level data structures shared between the
//! router-side exporter and the metrics collector: per-request schema usage
//! records, their aggregated form, and the RPC payload envelopes.

pub mod aggregate;
pub mod requests;
pub mod usage;

pub use aggregate::{AggregatedUsageRecord, UsageBatch};
pub use requests::{PublishAck, PublishAggregatedMetricsRequest, PublishUsageMetricsRequest};
pub use usage::{
    ClientInfo, OperationInfo, OperationType, RequestInfo, SchemaInfo, SchemaUsageRecord,
    TypeFieldUsage,
};
