//! Batch dispatch with retry and timeout
//!
//! The dispatcher performs the outbound publish for sealed batches and for
//! force-flushed single records. Every attempt runs under the configured
//! export timeout; transient failures are retried whole, on a constant
//! interval, bounded by both an attempt cap and a wall-clock cap.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use graphql_metrics_types::{
    PublishAck, PublishAggregatedMetricsRequest, PublishUsageMetricsRequest, SchemaUsageRecord,
    UsageBatch,
};

use crate::client::{ExportRequest, MetricsClient, PublishError};
use crate::settings::RetryOptions;
use crate::stats::ExporterMetrics;
use crate::telemetry::TelemetryMetrics;

/// Shared dispatch routine used by the dispatcher workers and the
/// force-flush path
pub(crate) struct Dispatcher {
    client: Arc<dyn MetricsClient>,
    secret: String,
    export_timeout: Duration,
    retry: RetryOptions,
    metrics: Arc<ExporterMetrics>,
    telemetry: Option<Arc<TelemetryMetrics>>,
}

impl Dispatcher {
    pub(crate) fn new(
        client: Arc<dyn MetricsClient>,
        secret: String,
        export_timeout: Duration,
        retry: RetryOptions,
        metrics: Arc<ExporterMetrics>,
        telemetry: Option<Arc<TelemetryMetrics>>,
    ) -> Self {
        Self {
            client,
            secret,
            export_timeout,
            retry,
            metrics,
            telemetry,
        }
    }

    /// Publish a sealed batch of aggregated entries
    ///
    /// Terminal failures are logged and swallowed; the batch is lost.
    pub(crate) async fn dispatch_batch(&self, batch: UsageBatch) {
        let batch_id = batch.batch_id;
        let entries = batch.size() as u64;
        let requests = batch.request_total();
        let payload = PublishAggregatedMetricsRequest {
            aggregation: batch.entries,
        };

        let client = Arc::clone(&self.client);
        let secret = self.secret.clone();
        let result = self
            .deliver(move || {
                let client = Arc::clone(&client);
                let request = ExportRequest::new(payload.clone(), &secret);
                async move { client.publish_aggregated_metrics(request).await }
            })
            .await;

        match result {
            Ok(_) => {
                self.metrics.record_batch_dispatched(entries, requests);
                if let Some(telemetry) = &self.telemetry {
                    telemetry.record_batch_size(entries);
                }
                debug!(%batch_id, entries, requests, "published aggregated usage batch");
            }
            Err(err) => {
                self.metrics.record_publish_failure();
                if let Some(telemetry) = &self.telemetry {
                    telemetry.record_publish_error();
                }
                error!(%batch_id, entries, error = %err, "dropping aggregated usage batch");
            }
        }
    }

    /// Publish a single record, unaggregated, and surface the outcome
    ///
    /// Used by the force-flush ingress path; the caller blocks on the full
    /// retry loop.
    pub(crate) async fn dispatch_record(
        &self,
        record: SchemaUsageRecord,
    ) -> Result<(), PublishError> {
        let payload = PublishUsageMetricsRequest {
            schema_usage: vec![record],
        };

        let client = Arc::clone(&self.client);
        let secret = self.secret.clone();
        let result = self
            .deliver(move || {
                let client = Arc::clone(&client);
                let request = ExportRequest::new(payload.clone(), &secret);
                async move { client.publish_usage_metrics(request).await }
            })
            .await;

        if let Err(err) = &result {
            self.metrics.record_publish_failure();
            if let Some(telemetry) = &self.telemetry {
                telemetry.record_publish_error();
            }
            error!(error = %err, "dropping force-flushed usage record");
        }

        result.map(|_| ())
    }

    /// Run one publish operation through the timeout and retry loop
    async fn deliver<F, Fut>(&self, attempt_fn: F) -> Result<PublishAck, PublishError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<PublishAck, PublishError>>,
    {
        let started = Instant::now();
        let mut retries: u32 = 0;

        loop {
            let attempt_started = Instant::now();
            let outcome = match tokio::time::timeout(self.export_timeout, attempt_fn()).await {
                Ok(Ok(ack)) => {
                    self.record_latency(attempt_started, true);
                    if retries > 0 {
                        debug!(retries, "publish succeeded after retrying");
                    }
                    return Ok(ack);
                }
                Ok(Err(err)) => err,
                Err(_) => PublishError::Timeout(self.export_timeout),
            };
            self.record_latency(attempt_started, false);

            if !self.should_retry(&outcome, retries, started) {
                return Err(outcome);
            }

            retries += 1;
            self.metrics.record_publish_retry();
            if let Some(telemetry) = &self.telemetry {
                telemetry.record_publish_retry();
            }
            warn!(
                attempt = retries,
                max_retry = self.retry.max_retry,
                delay = ?self.retry.interval,
                error = %outcome,
                "publish failed, retrying"
            );
            sleep(self.retry.interval).await;
        }
    }

    /// Check whether another attempt is allowed
    fn should_retry(&self, error: &PublishError, retries: u32, started: Instant) -> bool {
        if !self.retry.enabled || !error.is_retriable() {
            return false;
        }
        if retries >= self.retry.max_retry {
            return false;
        }
        // The next attempt must still start inside the wall-clock cap.
        started.elapsed() + self.retry.interval < self.retry.max_duration
    }

    fn record_latency(&self, attempt_started: Instant, success: bool) {
        if let Some(telemetry) = &self.telemetry {
            let duration_ms = attempt_started.elapsed().as_secs_f64() * 1000.0;
            telemetry.record_publish_latency(duration_ms, success);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graphql_metrics_types::{
        AggregatedUsageRecord, ClientInfo, OperationInfo, OperationType, RequestInfo, SchemaInfo,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedClient {
        /// Failures returned before succeeding, front first
        failures: Mutex<VecDeque<PublishError>>,
        calls: Mutex<u32>,
    }

    impl ScriptedClient {
        fn new(failures: Vec<PublishError>) -> Self {
            Self {
                failures: Mutex::new(failures.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }

        fn next_outcome(&self) -> Result<PublishAck, PublishError> {
            *self.calls.lock().unwrap() += 1;
            match self.failures.lock().unwrap().pop_front() {
                Some(err) => Err(err),
                None => Ok(PublishAck),
            }
        }
    }

    #[async_trait]
    impl MetricsClient for ScriptedClient {
        async fn publish_aggregated_metrics(
            &self,
            request: ExportRequest<PublishAggregatedMetricsRequest>,
        ) -> Result<PublishAck, PublishError> {
            assert_eq!(request.authorization(), Some("Bearer secret"));
            self.next_outcome()
        }

        async fn publish_usage_metrics(
            &self,
            request: ExportRequest<PublishUsageMetricsRequest>,
        ) -> Result<PublishAck, PublishError> {
            assert_eq!(request.authorization(), Some("Bearer secret"));
            self.next_outcome()
        }
    }

    fn record() -> SchemaUsageRecord {
        SchemaUsageRecord::new(
            OperationInfo::new(OperationType::Query, "hash-0", "user"),
            ClientInfo::new("storefront", "1.0.0"),
            SchemaInfo::new("v1"),
            RequestInfo::new(false, 200),
        )
    }

    fn dispatcher(client: Arc<ScriptedClient>, retry: RetryOptions) -> Dispatcher {
        Dispatcher::new(
            client,
            "secret".to_string(),
            Duration::from_millis(500),
            retry,
            Arc::new(ExporterMetrics::default()),
            None,
        )
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let client = Arc::new(ScriptedClient::new(vec![
            PublishError::Transient("unavailable".into()),
            PublishError::Transient("unavailable".into()),
        ]));
        let dispatcher = dispatcher(
            client.clone(),
            RetryOptions {
                enabled: true,
                max_retry: 3,
                interval: Duration::from_millis(10),
                max_duration: Duration::from_secs(5),
            },
        );

        let result = dispatcher.dispatch_record(record()).await;
        assert!(result.is_ok());
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let client = Arc::new(ScriptedClient::new(vec![PublishError::Permanent(
            "unauthenticated".into(),
        )]));
        let dispatcher = dispatcher(
            client.clone(),
            RetryOptions {
                enabled: true,
                max_retry: 3,
                interval: Duration::from_millis(10),
                max_duration: Duration::from_secs(5),
            },
        );

        let result = dispatcher.dispatch_record(record()).await;
        assert!(result.is_err());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_disabled_means_single_attempt() {
        let client = Arc::new(ScriptedClient::new(vec![PublishError::Transient(
            "unavailable".into(),
        )]));
        let dispatcher = dispatcher(
            client.clone(),
            RetryOptions {
                enabled: false,
                ..Default::default()
            },
        );

        let result = dispatcher.dispatch_record(record()).await;
        assert!(result.is_err());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_attempt_cap() {
        let client = Arc::new(ScriptedClient::new(vec![
            PublishError::Transient("unavailable".into()),
            PublishError::Transient("unavailable".into()),
            PublishError::Transient("unavailable".into()),
        ]));
        let dispatcher = dispatcher(
            client.clone(),
            RetryOptions {
                enabled: true,
                max_retry: 2,
                interval: Duration::from_millis(10),
                max_duration: Duration::from_secs(5),
            },
        );

        let result = dispatcher.dispatch_record(record()).await;
        assert!(result.is_err());
        // first attempt plus two retries
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_batch_dispatch_counts_entries_and_requests() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let metrics = Arc::new(ExporterMetrics::default());
        let dispatcher = Dispatcher::new(
            client,
            "secret".to_string(),
            Duration::from_millis(500),
            RetryOptions::default(),
            metrics.clone(),
            None,
        );

        let mut entry = AggregatedUsageRecord::from_record(record());
        entry.merge(&record());
        dispatcher.dispatch_batch(UsageBatch::new(vec![entry])).await;

        let stats = metrics.snapshot();
        assert_eq!(stats.batches_dispatched, 1);
        assert_eq!(stats.entries_dispatched, 1);
        assert_eq!(stats.requests_delivered, 2);
    }
}
