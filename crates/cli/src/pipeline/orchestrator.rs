//! Pipeline orchestrator - builds the session and drives the frame loop.
//!
//! The engine backend follows `engine.backend`: the in-process mock engine or
//! a remote engine over TCP.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use config_loader::SessionBlueprint;
use engine_bridge::Engine;
use frame_loop::LoopStats;
use tracing::{info, instrument, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The session blueprint, overrides applied
    pub blueprint: SessionBlueprint,

    /// How long streams may drain on shutdown (None = wait for all)
    pub drain_timeout: Option<Duration>,
}

/// Failed run, with whatever statistics were gathered up to the failure
#[derive(Debug)]
pub struct PipelineFailure {
    pub stats: PipelineStats,
    pub error: CliError,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `max_frames`, an unrecoverable error, or `stop` is set.
    ///
    /// `stop` is checked between frames; the frame in flight always completes.
    #[instrument(name = "pipeline_run", skip(self, stop), fields(scene = %self.config.blueprint.engine.scene))]
    pub async fn run(self, stop: Arc<AtomicBool>) -> Result<PipelineStats, PipelineFailure> {
        let blueprint = &self.config.blueprint;
        let engine = Engine::from_config(&blueprint.engine);
        let backend = engine.backend_name();

        if backend == "mock" {
            info!("Running with the MOCK engine (no renderer required)");
        } else {
            info!(address = %blueprint.engine.address, "Connecting to remote engine");
        }

        let mut frame_loop = match frame_loop::from_blueprint(blueprint, engine).await {
            Ok(frame_loop) => frame_loop,
            Err(e) => {
                return Err(PipelineFailure {
                    stats: PipelineStats::new(backend, blueprint.engine.scene, LoopStats::default()),
                    error: e.into(),
                })
            }
        };

        let outcome = frame_loop
            .run(blueprint.engine.scene, |_| !stop.load(Ordering::Relaxed))
            .await;

        info!("Shutting down frame loop...");
        let loop_stats = frame_loop.finish(self.config.drain_timeout).await;
        let stats = PipelineStats::new(backend, blueprint.engine.scene, loop_stats);

        match outcome {
            Ok(_) => {
                info!(
                    duration_secs = stats.loop_stats.duration.as_secs_f64(),
                    fps = format!("{:.2}", stats.loop_stats.fps()),
                    "Pipeline shutdown complete"
                );
                Ok(stats)
            }
            Err(e) => {
                warn!(error = %e, "Frame loop terminated with an error");
                Err(PipelineFailure {
                    stats,
                    error: e.into(),
                })
            }
        }
    }
}
