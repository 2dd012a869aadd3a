//! Metrics collector client seam
//!
//! The exporter does not own a transport. A concrete RPC client is injected
//! through the [`MetricsClient`] trait; the exporter only builds requests,
//! attaches the bearer header, and classifies failures for the retry loop.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use graphql_metrics_types::{
    PublishAck, PublishAggregatedMetricsRequest, PublishUsageMetricsRequest,
};

/// Header carrying the collector credential
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Publish error types
#[derive(Error, Debug)]
pub enum PublishError {
    /// Failure that may succeed on a later attempt
    #[error("transient publish failure: {0}")]
    Transient(String),

    /// Failure that will not be recovered by retrying
    #[error("permanent publish failure: {0}")]
    Permanent(String),

    /// The call did not complete within its deadline
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
}

impl PublishError {
    /// Check whether the retry loop may attempt the call again
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transient(_) | Self::Timeout(_) => true,
            Self::Permanent(_) => false,
        }
    }
}

/// A payload together with its outbound headers
#[derive(Debug, Clone)]
pub struct ExportRequest<T> {
    /// Request payload
    pub payload: T,
    /// Outbound headers
    pub headers: HashMap<String, String>,
}

impl<T> ExportRequest<T> {
    /// Create a request carrying the bearer credential
    pub fn new(payload: T, secret: &str) -> Self {
        let mut headers = HashMap::new();
        headers.insert(AUTHORIZATION_HEADER.to_string(), format!("Bearer {secret}"));
        Self { payload, headers }
    }

    /// Get the authorization header value, if present
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION_HEADER).map(String::as_str)
    }
}

/// Injected RPC client for the metrics collector service
#[async_trait]
pub trait MetricsClient: Send + Sync {
    /// Publish a batch of aggregated usage entries
    async fn publish_aggregated_metrics(
        &self,
        request: ExportRequest<PublishAggregatedMetricsRequest>,
    ) -> Result<PublishAck, PublishError>;

    /// Publish raw, unaggregated usage records
    async fn publish_usage_metrics(
        &self,
        request: ExportRequest<PublishUsageMetricsRequest>,
    ) -> Result<PublishAck, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header_attached() {
        let request = ExportRequest::new(
            PublishUsageMetricsRequest {
                schema_usage: vec![],
            },
            "secret",
        );
        assert_eq!(request.authorization(), Some("Bearer secret"));
    }

    #[test]
    fn test_transient_errors_are_retriable() {
        assert!(PublishError::Transient("connection reset".into()).is_retriable());
        assert!(PublishError::Timeout(Duration::from_secs(1)).is_retriable());
        assert!(!PublishError::Permanent("unauthenticated".into()).is_retriable());
    }
}
