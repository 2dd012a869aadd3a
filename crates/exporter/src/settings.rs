//! Exporter settings
//!
//! Immutable after construction. Validated once by the exporter constructor.

use std::time::Duration;

use crate::error::ExporterError;

/// Default maximum number of aggregated entries per dispatched batch
const DEFAULT_BATCH_SIZE: usize = 1024;

/// Default capacity of the pending-record queue
const DEFAULT_QUEUE_SIZE: usize = 8192;

/// Default periodic flush interval
const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Default per-RPC deadline
const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of dispatch workers
const DEFAULT_DISPATCH_WORKERS: usize = 1;

/// Retry behavior for failed publishes
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Whether failed publishes are retried at all
    pub enabled: bool,
    /// Maximum retry attempts, not counting the first attempt
    pub max_retry: u32,
    /// Constant delay between attempts
    pub interval: Duration,
    /// Hard cap on total time spent across all attempts
    pub max_duration: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retry: 3,
            interval: Duration::from_secs(5),
            max_duration: Duration::from_secs(60),
        }
    }
}

/// Exporter configuration
#[derive(Debug, Clone)]
pub struct ExporterSettings {
    /// Maximum aggregated entries dispatched per RPC
    pub batch_size: usize,
    /// Maximum pending records buffered before drops occur
    pub queue_size: usize,
    /// Periodic flush interval for partially filled batches
    pub interval: Duration,
    /// Deadline applied to each publish RPC
    pub export_timeout: Duration,
    /// Number of dispatch workers draining sealed batches
    pub dispatch_workers: usize,
    /// Retry behavior
    pub retry: RetryOptions,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            queue_size: DEFAULT_QUEUE_SIZE,
            interval: DEFAULT_INTERVAL,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
            dispatch_workers: DEFAULT_DISPATCH_WORKERS,
            retry: RetryOptions::default(),
        }
    }
}

impl ExporterSettings {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ExporterError> {
        if self.batch_size == 0 {
            return Err(ExporterError::InvalidConfig(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.queue_size == 0 {
            return Err(ExporterError::InvalidConfig(
                "queue_size must be greater than 0".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(ExporterError::InvalidConfig(
                "interval must be greater than 0".to_string(),
            ));
        }
        if self.export_timeout.is_zero() {
            return Err(ExporterError::InvalidConfig(
                "export_timeout must be greater than 0".to_string(),
            ));
        }
        if self.dispatch_workers == 0 {
            return Err(ExporterError::InvalidConfig(
                "dispatch_workers must be greater than 0".to_string(),
            ));
        }
        if self.retry.enabled {
            if self.retry.interval.is_zero() {
                return Err(ExporterError::InvalidConfig(
                    "retry.interval must be greater than 0".to_string(),
                ));
            }
            if self.retry.max_duration.is_zero() {
                return Err(ExporterError::InvalidConfig(
                    "retry.max_duration must be greater than 0".to_string(),
                ));
            }
        }
        Ok(())
    }
}
