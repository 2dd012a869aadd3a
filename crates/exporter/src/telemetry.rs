//! OpenTelemetry integration
//!
//! Optional metrics instrumentation for the exporter pipeline. The exporter
//! works without it; when wired in, the same events that feed the internal
//! counters are also recorded through OpenTelemetry instruments.

use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use std::sync::Arc;
use thiserror::Error;

/// Telemetry error types
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("telemetry initialization error: {0}")]
    InitializationError(String),

    #[error(transparent)]
    OpenTelemetryError(#[from] opentelemetry::metrics::MetricsError),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Telemetry instruments for the exporter
pub struct TelemetryMetrics {
    /// Records seen at ingress, labeled by outcome
    record_counter: Counter<u64>,
    /// Aggregated entries per dispatched batch
    batch_size: Histogram<u64>,
    /// Publish call latency, labeled by success
    publish_latency: Histogram<f64>,
    /// Publishes abandoned after retries were exhausted
    publish_errors: Counter<u64>,
    /// Individual retry attempts
    publish_retries: Counter<u64>,
}

impl TelemetryMetrics {
    /// Create new telemetry instruments on the given meter
    pub fn new(meter: Meter) -> Result<Self> {
        let record_counter = meter
            .u64_counter("graphql_usage_records_total")
            .with_description("Schema usage records seen at ingress")
            .with_unit(opentelemetry::metrics::Unit::new("records"))
            .init();

        let batch_size = meter
            .u64_histogram("graphql_usage_batch_size")
            .with_description("Aggregated entries per dispatched batch")
            .with_unit(opentelemetry::metrics::Unit::new("entries"))
            .init();

        let publish_latency = meter
            .f64_histogram("graphql_usage_publish_duration_ms")
            .with_description("Time taken to publish a batch to the collector")
            .with_unit(opentelemetry::metrics::Unit::new("ms"))
            .init();

        let publish_errors = meter
            .u64_counter("graphql_usage_publish_errors_total")
            .with_description("Publishes abandoned after retries were exhausted")
            .with_unit(opentelemetry::metrics::Unit::new("errors"))
            .init();

        let publish_retries = meter
            .u64_counter("graphql_usage_publish_retries_total")
            .with_description("Retry attempts across all publishes")
            .with_unit(opentelemetry::metrics::Unit::new("attempts"))
            .init();

        Ok(Self {
            record_counter,
            batch_size,
            publish_latency,
            publish_errors,
            publish_retries,
        })
    }

    /// Record an ingress outcome
    pub fn record_ingress(&self, outcome: &'static str) {
        self.record_counter
            .add(1, &[KeyValue::new("outcome", outcome)]);
    }

    /// Record the size of a dispatched batch
    pub fn record_batch_size(&self, entries: u64) {
        self.batch_size.record(entries, &[]);
    }

    /// Record publish latency
    pub fn record_publish_latency(&self, duration_ms: f64, success: bool) {
        self.publish_latency
            .record(duration_ms, &[KeyValue::new("success", success.to_string())]);
    }

    /// Record a terminal publish failure
    pub fn record_publish_error(&self) {
        self.publish_errors.add(1, &[]);
    }

    /// Record a retry attempt
    pub fn record_publish_retry(&self) {
        self.publish_retries.add(1, &[]);
    }
}

/// Telemetry provider configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name
    pub service_name: String,
    /// Service version
    pub service_version: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "graphql-metrics-exporter".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Telemetry provider owning the meter provider and instruments
pub struct TelemetryProvider {
    meter_provider: SdkMeterProvider,
    metrics: Arc<TelemetryMetrics>,
}

impl TelemetryProvider {
    /// Initialize telemetry provider
    pub fn init(config: TelemetryConfig) -> Result<Self> {
        let resource = Resource::new(vec![
            KeyValue::new("service.name", config.service_name.clone()),
            KeyValue::new("service.version", config.service_version.clone()),
        ]);

        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource)
            .build();

        let meter = meter_provider.meter("graphql_metrics_exporter");
        let metrics = Arc::new(TelemetryMetrics::new(meter)?);

        Ok(Self {
            meter_provider,
            metrics,
        })
    }

    /// Get the telemetry instruments
    pub fn metrics(&self) -> Arc<TelemetryMetrics> {
        self.metrics.clone()
    }

    /// Shutdown telemetry
    pub fn shutdown(self) -> Result<()> {
        self.meter_provider
            .shutdown()
            .map_err(|e| TelemetryError::InitializationError(e.to_string()))
    }
}
