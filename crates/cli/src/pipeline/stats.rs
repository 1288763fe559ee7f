//! Pipeline statistics.

use contracts::SceneId;
use frame_loop::LoopStats;

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Engine backend the session ran on
    pub backend: &'static str,

    pub scene: SceneId,

    /// Frame loop statistics, including final per-stream metrics
    pub loop_stats: LoopStats,
}

impl PipelineStats {
    pub fn new(backend: &'static str, scene: SceneId, loop_stats: LoopStats) -> Self {
        Self {
            backend,
            scene,
            loop_stats,
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let stats = &self.loop_stats;

        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                   flightsync Statistics                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Scene: {} ({})", self.scene, self.backend);
        println!("   ├─ Duration: {:.2}s", stats.duration.as_secs_f64());
        println!("   ├─ Frames published: {}", stats.frames_published);
        match stats.last_frame_id {
            Some(id) => println!("   ├─ Last frame id: {}", id),
            None => println!("   ├─ Last frame id: none"),
        }
        println!("   ├─ FPS: {:.2}", stats.fps());
        println!("   ├─ Render retries: {}", stats.retries);
        match stats.termination {
            Some(reason) => println!("   └─ Termination: {:?}", reason),
            None => println!("   └─ Termination: running"),
        }

        println!("\n📤 Channels");
        println!("   ├─ Queued for delivery: {}", stats.channels_published);
        println!("   ├─ Unrouted: {}", stats.channels_unrouted);
        println!("   └─ Refused: {}", stats.delivery_failures);

        let summary = stats.metrics.summary();
        println!("\n📈 Timing");
        println!("   ├─ Render latency (ms): {}", summary.render_latency_ms);
        println!("   └─ Tick duration (ms): {}", summary.tick_duration_ms);

        if !stats.streams.is_empty() {
            println!("\n🔌 Streams ({})", stats.streams.len());
            for (i, (name, snapshot)) in stats.streams.iter().enumerate() {
                let prefix = if i == stats.streams.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: {} written, {} failed, {} dropped",
                    prefix,
                    name,
                    snapshot.write_count,
                    snapshot.failure_count,
                    snapshot.dropped_count
                );
            }
        }

        println!();
    }
}
