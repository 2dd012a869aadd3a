//! Schema usage record types
//!
//! A [`SchemaUsageRecord`] describes which parts of a GraphQL schema a single
//! request touched: the operation, the calling client, the schema version,
//! the request outcome, and the per-type-field access counts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// GraphQL operation type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    /// Get operation type as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

/// Information about the executed operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationInfo {
    /// Operation type
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    /// Short content hash of the normalized operation document
    pub hash: String,
    /// Operation name
    pub name: String,
}

impl OperationInfo {
    /// Create new operation info
    pub fn new(
        operation_type: OperationType,
        hash: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            operation_type,
            hash: hash.into(),
            name: name.into(),
        }
    }
}

/// Information about the calling client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientInfo {
    /// Client name
    pub name: String,
    /// Client version
    pub version: String,
}

impl ClientInfo {
    /// Create new client info
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Information about the schema the request was executed against
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaInfo {
    /// Schema version
    pub version: String,
}

impl SchemaInfo {
    /// Create new schema info
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

/// Outcome of the request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestInfo {
    /// Whether the request produced an error
    pub error: bool,
    /// HTTP status code returned to the client
    pub status_code: u16,
}

impl RequestInfo {
    /// Create new request info
    pub fn new(error: bool, status_code: u16) -> Self {
        Self { error, status_code }
    }
}

/// Usage counts for a single type field
///
/// Two entries are mergeable when their `path`, `type_names`, and
/// `subgraph_ids` are all equal; merging sums the counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeFieldUsage {
    /// Field path from the operation root
    pub path: Vec<String>,
    /// Type names involved at this path
    pub type_names: Vec<String>,
    /// Subgraphs that resolved this field
    pub subgraph_ids: Vec<String>,
    /// Number of accesses
    pub count: u64,
}

impl TypeFieldUsage {
    /// Create new type field usage
    pub fn new(path: Vec<String>, type_names: Vec<String>, subgraph_ids: Vec<String>) -> Self {
        Self {
            path,
            type_names,
            subgraph_ids,
            count: 0,
        }
    }

    /// Set the access count
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    /// Check whether another entry covers the same field coordinates
    pub fn same_field(&self, other: &TypeFieldUsage) -> bool {
        self.path == other.path
            && self.type_names == other.type_names
            && self.subgraph_ids == other.subgraph_ids
    }
}

/// Schema usage produced by a single GraphQL request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaUsageRecord {
    /// Operation info
    pub operation: OperationInfo,
    /// Client info
    pub client: ClientInfo,
    /// Schema info
    pub schema: SchemaInfo,
    /// Request outcome
    pub request: RequestInfo,
    /// Per-field usage counts
    pub type_field_metrics: Vec<TypeFieldUsage>,
    /// Free-form attributes attached by the router
    pub attributes: HashMap<String, String>,
}

impl SchemaUsageRecord {
    /// Create new schema usage record
    pub fn new(
        operation: OperationInfo,
        client: ClientInfo,
        schema: SchemaInfo,
        request: RequestInfo,
    ) -> Self {
        Self {
            operation,
            client,
            schema,
            request,
            type_field_metrics: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    /// Add a type field usage entry
    pub fn with_type_field(mut self, usage: TypeFieldUsage) -> Self {
        self.type_field_metrics.push(usage);
        self
    }

    /// Add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
