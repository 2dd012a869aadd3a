//! GraphQL usage metrics exporter
//!
//! Accepts per-request schema usage records from request-handling tasks and
//! forwards them to the metrics collector in aggregated batches. Admission
//! is non-blocking; a single batch worker owns aggregation and the flush
//! triggers; a pool of dispatch workers performs the outbound publishes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use graphql_metrics_types::{SchemaUsageRecord, UsageBatch};

use crate::aggregation::AggregationMap;
use crate::client::MetricsClient;
use crate::dispatch::Dispatcher;
use crate::error::{ExporterError, Result};
use crate::settings::ExporterSettings;
use crate::stats::{ExporterMetrics, ExporterStats};
use crate::telemetry::TelemetryMetrics;

/// Sealed batches buffered between the batch worker and the dispatch pool
const BATCH_CHANNEL_CAPACITY: usize = 8;

struct WorkerHandles {
    batcher: JoinHandle<()>,
    dispatchers: Vec<JoinHandle<()>>,
}

/// Wait-group over ingress calls in flight
///
/// Counts every `record_usage` call from before its stopped-flag check until
/// its enqueue or force-flush dispatch resolves. Shutdown drains this to
/// zero before draining the queue, so a call that observed the exporter as
/// running cannot lose its record to a concurrent drain, and no force-flush
/// dispatch is still outstanding when shutdown returns.
struct InFlightTracker {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlightTracker {
    fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    fn track(&self) -> InFlightGuard<'_> {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard { tracker: self }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct InFlightGuard<'a> {
    tracker: &'a InFlightTracker,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.tracker.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}

/// Exporter for GraphQL schema usage metrics
pub struct GraphqlMetricsExporter {
    record_sender: mpsc::Sender<SchemaUsageRecord>,
    shutdown_signal: watch::Sender<bool>,
    shut_down: AtomicBool,
    in_flight: InFlightTracker,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<ExporterMetrics>,
    telemetry: Option<Arc<TelemetryMetrics>>,
    handles: Mutex<Option<WorkerHandles>>,
}

impl GraphqlMetricsExporter {
    /// Create the exporter and spawn its workers
    ///
    /// Must be called from within a tokio runtime. Fails if the settings do
    /// not validate.
    pub fn new(
        client: Arc<dyn MetricsClient>,
        secret: impl Into<String>,
        settings: ExporterSettings,
    ) -> Result<Self> {
        Self::build(client, secret.into(), settings, None)
    }

    /// Create the exporter with OpenTelemetry instrumentation wired in
    pub fn with_telemetry(
        client: Arc<dyn MetricsClient>,
        secret: impl Into<String>,
        settings: ExporterSettings,
        telemetry: Arc<TelemetryMetrics>,
    ) -> Result<Self> {
        Self::build(client, secret.into(), settings, Some(telemetry))
    }

    fn build(
        client: Arc<dyn MetricsClient>,
        secret: String,
        settings: ExporterSettings,
        telemetry: Option<Arc<TelemetryMetrics>>,
    ) -> Result<Self> {
        settings.validate()?;

        let metrics = Arc::new(ExporterMetrics::default());
        let dispatcher = Arc::new(Dispatcher::new(
            client,
            secret,
            settings.export_timeout,
            settings.retry.clone(),
            Arc::clone(&metrics),
            telemetry.clone(),
        ));

        let (record_sender, record_receiver) = mpsc::channel(settings.queue_size);
        let (batch_sender, batch_receiver) = mpsc::channel(BATCH_CHANNEL_CAPACITY);
        let (shutdown_signal, shutdown_receiver) = watch::channel(false);

        let batcher = tokio::spawn(run_batcher(
            record_receiver,
            shutdown_receiver,
            batch_sender,
            settings.batch_size,
            settings.interval,
        ));

        let batch_receiver = Arc::new(AsyncMutex::new(batch_receiver));
        let dispatchers = (0..settings.dispatch_workers)
            .map(|worker| {
                tokio::spawn(run_dispatcher(
                    worker,
                    Arc::clone(&batch_receiver),
                    Arc::clone(&dispatcher),
                ))
            })
            .collect();

        info!(
            batch_size = settings.batch_size,
            queue_size = settings.queue_size,
            workers = settings.dispatch_workers,
            "started graphql usage metrics exporter"
        );

        Ok(Self {
            record_sender,
            shutdown_signal,
            shut_down: AtomicBool::new(false),
            in_flight: InFlightTracker::new(),
            dispatcher,
            metrics,
            telemetry,
            handles: Mutex::new(Some(WorkerHandles {
                batcher,
                dispatchers,
            })),
        })
    }

    /// Admit a usage record
    ///
    /// With `force_flush == false` this never blocks: the record is offered
    /// to the bounded queue and dropped if the queue is full. With
    /// `force_flush == true` the record bypasses batching entirely and the
    /// call resolves once the record has been published (or its retries are
    /// exhausted), so the caller observes real delivery latency.
    ///
    /// Returns whether the record was accepted: enqueued for the best-effort
    /// path, delivered for the force-flush path. Always `false` after
    /// shutdown.
    pub async fn record_usage(&self, record: SchemaUsageRecord, force_flush: bool) -> bool {
        // Registered before the stopped check: a concurrent shutdown either
        // observes this call and waits for it, or this call observes the
        // flag and rejects the record.
        let _in_flight = self.in_flight.track();

        if self.is_shut_down() {
            return false;
        }

        if force_flush {
            self.metrics.record_force_flushed();
            if let Some(telemetry) = &self.telemetry {
                telemetry.record_ingress("force_flush");
            }
            return self.dispatcher.dispatch_record(record).await.is_ok();
        }

        match self.record_sender.try_send(record) {
            Ok(()) => {
                self.metrics.record_accepted();
                if let Some(telemetry) = &self.telemetry {
                    telemetry.record_ingress("accepted");
                }
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.record_dropped();
                if let Some(telemetry) = &self.telemetry {
                    telemetry.record_ingress("dropped");
                }
                debug!("usage queue full, dropping record");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Check whether shutdown has been initiated
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Get current exporter statistics
    pub fn stats(&self) -> ExporterStats {
        self.metrics.snapshot()
    }

    /// Shut the exporter down, flushing all pending records
    ///
    /// Idempotent. Further `record_usage` calls return `false` immediately.
    /// Waits until ingress calls already past the stopped check have
    /// resolved (including synchronous force-flush dispatches), the batch
    /// worker has drained the queue, and every outstanding dispatch has
    /// completed, or until `timeout` elapses, in which case the workers are
    /// left to finish detached and [`ExporterError::ShutdownTimeout`] is
    /// returned. In-flight publishes still honor their own export timeout
    /// either way.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!("shutting down graphql usage metrics exporter");

        let handles = self
            .handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let wait = async {
            // Records admitted before the flag flipped must reach the queue
            // before the batch worker drains it.
            self.in_flight.wait_idle().await;
            let _ = self.shutdown_signal.send(true);

            if let Some(handles) = handles {
                if let Err(err) = handles.batcher.await {
                    error!(error = %err, "batch worker terminated abnormally");
                }
                for (worker, handle) in handles.dispatchers.into_iter().enumerate() {
                    if let Err(err) = handle.await {
                        error!(worker, error = %err, "dispatch worker terminated abnormally");
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(()) => {
                info!("exporter shutdown complete");
                Ok(())
            }
            Err(_) => {
                // The workers still need the drain signal; they finish
                // detached.
                let _ = self.shutdown_signal.send(true);
                error!(?timeout, "exporter shutdown timed out");
                Err(ExporterError::ShutdownTimeout(timeout))
            }
        }
    }
}

/// Single worker owning the aggregation map and the flush triggers
async fn run_batcher(
    mut records: mpsc::Receiver<SchemaUsageRecord>,
    mut shutdown: watch::Receiver<bool>,
    batches: mpsc::Sender<UsageBatch>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut aggregation = AggregationMap::new();
    let mut ticker = interval(flush_interval);

    loop {
        tokio::select! {
            maybe_record = records.recv() => match maybe_record {
                Some(record) => {
                    aggregation.insert(record);
                    if aggregation.len() >= batch_size {
                        seal_and_forward(&mut aggregation, &batches).await;
                    }
                }
                // Exporter dropped without shutdown; flush what we have.
                None => break,
            },
            _ = ticker.tick() => {
                if !aggregation.is_empty() {
                    debug!(entries = aggregation.len(), "flushing partial batch on interval");
                    seal_and_forward(&mut aggregation, &batches).await;
                }
            }
            _ = shutdown.changed() => {
                debug!("draining usage queue for shutdown");
                while let Ok(record) = records.try_recv() {
                    aggregation.insert(record);
                    if aggregation.len() >= batch_size {
                        seal_and_forward(&mut aggregation, &batches).await;
                    }
                }
                break;
            }
        }
    }

    if !aggregation.is_empty() {
        seal_and_forward(&mut aggregation, &batches).await;
    }
    // Dropping the batch sender lets the dispatch workers drain and exit.
    debug!("batch worker exited");
}

async fn seal_and_forward(aggregation: &mut AggregationMap, batches: &mpsc::Sender<UsageBatch>) {
    let batch = UsageBatch::new(aggregation.seal());
    if batches.send(batch).await.is_err() {
        warn!("dispatch channel closed, discarding sealed batch");
    }
}

/// Dispatch worker draining sealed batches
async fn run_dispatcher(
    worker: usize,
    batches: Arc<AsyncMutex<mpsc::Receiver<UsageBatch>>>,
    dispatcher: Arc<Dispatcher>,
) {
    loop {
        let batch = { batches.lock().await.recv().await };
        match batch {
            Some(batch) => dispatcher.dispatch_batch(batch).await,
            None => break,
        }
    }
    debug!(worker, "dispatch worker exited");
}
