//! Common test utilities for integration tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use graphql_metrics_exporter::{
    ExportRequest, ExporterSettings, MetricsClient, PublishError, RetryOptions,
};
use graphql_metrics_types::{
    AggregatedUsageRecord, ClientInfo, OperationInfo, OperationType, PublishAck,
    PublishAggregatedMetricsRequest, PublishUsageMetricsRequest, RequestInfo, SchemaInfo,
    SchemaUsageRecord, TypeFieldUsage,
};

/// In-process stand-in for the collector RPC client
///
/// Records every published payload and asserts the bearer header on every
/// call. Failures can be scripted up front; once the script is exhausted,
/// calls succeed.
pub struct RecordingClient {
    expected_authorization: String,
    pub published_aggregations: Mutex<Vec<Vec<AggregatedUsageRecord>>>,
    pub published_usage: Mutex<Vec<Vec<SchemaUsageRecord>>>,
    scripted_failures: Mutex<VecDeque<PublishError>>,
    calls: AtomicU32,
}

impl RecordingClient {
    pub fn new(secret: &str) -> Self {
        Self::with_failures(secret, Vec::new())
    }

    pub fn with_failures(secret: &str, failures: Vec<PublishError>) -> Self {
        Self {
            expected_authorization: format!("Bearer {secret}"),
            published_aggregations: Mutex::new(Vec::new()),
            published_usage: Mutex::new(Vec::new()),
            scripted_failures: Mutex::new(failures.into()),
            calls: AtomicU32::new(0),
        }
    }

    /// Total publish invocations observed, including failed ones
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn aggregations(&self) -> Vec<Vec<AggregatedUsageRecord>> {
        self.published_aggregations.lock().unwrap().clone()
    }

    pub fn usage_batches(&self) -> Vec<Vec<SchemaUsageRecord>> {
        self.published_usage.lock().unwrap().clone()
    }

    pub fn clear_usage_batches(&self) {
        self.published_usage.lock().unwrap().clear();
    }

    fn observe<T>(&self, request: &ExportRequest<T>) -> Result<(), PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(
            request.authorization(),
            Some(self.expected_authorization.as_str()),
            "every outbound publish must carry the bearer header"
        );
        match self.scripted_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetricsClient for RecordingClient {
    async fn publish_aggregated_metrics(
        &self,
        request: ExportRequest<PublishAggregatedMetricsRequest>,
    ) -> Result<PublishAck, PublishError> {
        self.observe(&request)?;
        self.published_aggregations
            .lock()
            .unwrap()
            .push(request.payload.aggregation);
        Ok(PublishAck)
    }

    async fn publish_usage_metrics(
        &self,
        request: ExportRequest<PublishUsageMetricsRequest>,
    ) -> Result<PublishAck, PublishError> {
        self.observe(&request)?;
        self.published_usage
            .lock()
            .unwrap()
            .push(request.payload.schema_usage);
        Ok(PublishAck)
    }
}

/// Create exporter settings for tests, retries disabled
pub fn test_settings(batch_size: usize, queue_size: usize, interval: Duration) -> ExporterSettings {
    ExporterSettings {
        batch_size,
        queue_size,
        interval,
        export_timeout: Duration::from_millis(500),
        dispatch_workers: 1,
        retry: RetryOptions {
            enabled: false,
            max_retry: 3,
            interval: Duration::from_millis(100),
            max_duration: Duration::from_millis(300),
        },
    }
}

/// Create a usage record for the given operation hash
pub fn usage_record(hash: &str) -> SchemaUsageRecord {
    SchemaUsageRecord::new(
        OperationInfo::new(OperationType::Query, hash, "user"),
        ClientInfo::new("storefront", "1.0.0"),
        SchemaInfo::new("1"),
        RequestInfo::new(false, 200),
    )
    .with_type_field(
        TypeFieldUsage::new(
            vec!["user".into(), "id".into()],
            vec!["User".into(), "ID".into()],
            vec!["1".into(), "2".into()],
        )
        .with_count(2),
    )
    .with_type_field(
        TypeFieldUsage::new(
            vec!["user".into(), "name".into()],
            vec!["User".into(), "String".into()],
            vec!["1".into(), "2".into()],
        )
        .with_count(1),
    )
}
