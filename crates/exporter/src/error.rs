//! Error types for the exporter

use std::time::Duration;
use thiserror::Error;

/// Result type alias for exporter operations
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Errors surfaced to the exporter's caller
///
/// Only construction and shutdown can fail. Queue pressure and publish
/// failures are reported through the ingress boolean and internal counters,
/// never through this type.
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("invalid exporter configuration: {0}")]
    InvalidConfig(String),

    #[error("shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}
