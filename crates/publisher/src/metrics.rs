//! Stream metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single output stream
#[derive(Debug, Default)]
pub struct StreamMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Total successful deliveries
    write_count: AtomicU64,
    /// Total delivery failures
    failure_count: AtomicU64,
    /// Total images dropped (queue full or worker gone)
    dropped_count: AtomicU64,
    /// Frame id of the latest delivered image, plus one (0 = nothing yet)
    last_frame: AtomicU64,
}

impl StreamMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Count a successful delivery of `frame_id`
    pub fn record_write(&self, frame_id: u64) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.last_frame
            .fetch_max(frame_id.saturating_add(1), Ordering::Relaxed);
    }

    /// Latest frame this stream delivered
    pub fn last_frame_id(&self) -> Option<u64> {
        self.last_frame.load(Ordering::Relaxed).checked_sub(1)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> StreamMetricsSnapshot {
        StreamMetricsSnapshot {
            queue_len: self.queue_len(),
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
            last_frame_id: self.last_frame_id(),
        }
    }
}

/// Snapshot of stream metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamMetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
    pub last_frame_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_frame_tracks_maximum() {
        let metrics = StreamMetrics::new();
        assert_eq!(metrics.last_frame_id(), None);
        metrics.record_write(0);
        assert_eq!(metrics.last_frame_id(), Some(0));
        metrics.record_write(5);
        metrics.record_write(3);
        assert_eq!(metrics.snapshot().last_frame_id, Some(5));
        assert_eq!(metrics.write_count(), 3);
    }
}
