//! GraphQL usage metrics exporter
//!
//! This crate forwards per-request schema usage records from a GraphQL
//! router to a remote metrics collector. Records are admitted without
//! blocking the request path, aggregated by content fingerprint, batched by
//! size and time, and published over an injected RPC client with retries,
//! per-call deadlines, and a flushing graceful shutdown.

pub mod aggregation;
pub mod client;
mod dispatch;
pub mod error;
pub mod exporter;
pub mod settings;
pub mod stats;
pub mod telemetry;

pub use aggregation::AggregationKey;

pub use client::{ExportRequest, MetricsClient, PublishError, AUTHORIZATION_HEADER};

pub use error::{ExporterError, Result};

pub use exporter::GraphqlMetricsExporter;

pub use settings::{ExporterSettings, RetryOptions};

pub use stats::ExporterStats;

pub use telemetry::{TelemetryConfig, TelemetryError, TelemetryMetrics, TelemetryProvider};
