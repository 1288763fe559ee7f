//! Loop statistics

use std::time::Duration;

use contracts::FrameId;
use observability::LoopMetricsAggregator;
use publisher::StreamMetricsSnapshot;

use crate::runner::TerminationReason;

/// Statistics from a loop run
#[derive(Debug, Clone, Default)]
pub struct LoopStats {
    /// Ticks started, including the one that failed
    pub ticks: u64,

    /// Frames rendered, collected and handed to the publisher
    pub frames_published: u64,

    /// Channel images queued for delivery
    pub channels_published: u64,

    /// Channels present in a frame but without a route
    pub channels_unrouted: u64,

    /// Images a stream refused or could not package
    pub delivery_failures: u64,

    /// Re-renders of an already requested frame
    pub retries: u64,

    /// Id of the last published frame
    pub last_frame_id: Option<FrameId>,

    /// Wall time from connect to termination
    pub duration: Duration,

    /// Why the loop stopped
    pub termination: Option<TerminationReason>,

    /// Render latency and tick duration statistics
    pub metrics: LoopMetricsAggregator,

    /// Final per-stream metrics, filled by `FrameLoop::finish`
    pub streams: Vec<(String, StreamMetricsSnapshot)>,
}

impl LoopStats {
    /// Frames per second throughput
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_published as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Id the next tick would render
    pub fn next_frame_id(&self) -> FrameId {
        self.last_frame_id.map_or(0, |id| id + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_and_next_frame() {
        let mut stats = LoopStats::default();
        assert_eq!(stats.fps(), 0.0);
        assert_eq!(stats.next_frame_id(), 0);

        stats.frames_published = 50;
        stats.last_frame_id = Some(49);
        stats.duration = Duration::from_secs(2);
        assert_eq!(stats.fps(), 25.0);
        assert_eq!(stats.next_frame_id(), 50);
    }
}
