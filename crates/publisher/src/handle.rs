//! StreamHandle - runs one output stream behind an isolated queue and worker task

use std::sync::Arc;
use std::time::Duration;

use contracts::{OutputStream, StampedImage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::StreamMetrics;

/// Why an image did not enter a stream queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryRefused {
    /// Queue at capacity, image dropped
    QueueFull,
    /// Worker task is gone
    Closed,
}

impl DeliveryRefused {
    /// Status label for metrics
    pub fn as_status(&self) -> &'static str {
        match self {
            DeliveryRefused::QueueFull => "queue_full",
            DeliveryRefused::Closed => "closed",
        }
    }
}

/// Handle to a running stream worker
pub struct StreamHandle {
    /// Stream name
    name: String,
    /// Channel to send images to worker
    tx: mpsc::Sender<StampedImage>,
    /// Shared metrics
    metrics: Arc<StreamMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl StreamHandle {
    /// Create a new StreamHandle and spawn the worker task
    pub fn spawn<S: OutputStream + 'static>(stream: S, queue_capacity: usize) -> Self {
        let name = stream.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(StreamMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            stream_worker(stream, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get stream name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<StreamMetrics> {
        &self.metrics
    }

    /// Queue an image for the worker (non-blocking)
    pub fn try_send(&self, image: StampedImage) -> Result<(), DeliveryRefused> {
        match self.tx.try_send(image) {
            Ok(()) => {
                let depth = self.tx.max_capacity() - self.tx.capacity();
                self.metrics.set_queue_len(depth);
                observability::record_stream_queue_depth(&self.name, depth);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(image)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    stream = %self.name,
                    frame_id = image.frame_id,
                    "Queue full, image dropped"
                );
                Err(DeliveryRefused::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.inc_dropped_count();
                error!(stream = %self.name, "Stream worker closed unexpectedly");
                Err(DeliveryRefused::Closed)
            }
        }
    }

    /// Shutdown the stream worker
    ///
    /// Closes the queue and waits for the worker to drain, flush and close.
    /// A worker still busy after `drain_timeout` is aborted and its queued
    /// images are lost. Returns whether the worker finished on its own.
    #[instrument(name = "stream_handle_shutdown", skip(self), fields(stream = %self.name))]
    pub async fn shutdown(self, drain_timeout: Option<Duration>) -> bool {
        // Drop sender to signal worker to stop
        drop(self.tx);
        let mut worker = self.worker_handle;

        let joined = match drain_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut worker).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        stream = %self.name,
                        timeout_ms = limit.as_millis() as u64,
                        "Stream did not drain in time, aborting worker"
                    );
                    worker.abort();
                    return false;
                }
            },
            None => worker.await,
        };

        if let Err(e) = joined {
            error!(stream = %self.name, error = ?e, "Worker task panicked");
            return false;
        }
        debug!(stream = %self.name, "StreamHandle shutdown complete");
        true
    }
}

/// Worker task that consumes images and delivers them to the stream
#[instrument(
    name = "stream_worker_loop",
    skip(stream, rx, metrics),
    fields(stream = %name)
)]
async fn stream_worker<S: OutputStream>(
    mut stream: S,
    mut rx: mpsc::Receiver<StampedImage>,
    metrics: Arc<StreamMetrics>,
    name: String,
) {
    debug!(stream = %name, "Stream worker started");

    while let Some(image) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match stream.deliver(&image).await {
            Ok(()) => {
                metrics.record_write(image.frame_id);
                observability::record_stream_delivery(&name, "ok");
            }
            Err(e) => {
                metrics.inc_failure_count();
                observability::record_stream_delivery(&name, "write_error");
                error!(
                    stream = %name,
                    frame_id = image.frame_id,
                    error = %e,
                    "Delivery failed"
                );
                // Keep going: one bad write must not stop the stream
            }
        }
    }

    if let Err(e) = stream.flush().await {
        error!(stream = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = stream.close().await {
        error!(stream = %name, error = %e, "Close failed on shutdown");
    }

    debug!(stream = %name, "Stream worker stopped");
}
