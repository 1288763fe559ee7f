//! Camera Streams Example
//!
//! Runs the built-in `camera_streams` session: a quadrotor with a forward
//! camera (color and depth) bouncing between z = 0 and z = 5 at 50 Hz. Each
//! rendered channel is logged through its stream; `/segmentation` and
//! `/opticalflow` stay idle because their channels are disabled.
//!
//! Run with the mock engine:   cargo run -p demos --bin camera_streams
//! Run against an engine:      cargo run -p demos --bin camera_streams -- 127.0.0.1:10253
//!
//! Stops after `FLIGHTSYNC_DEMO_FRAMES` frames (default 250) or on Ctrl+C.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use config_loader::presets;
use contracts::EngineBackend;
use engine_bridge::Engine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init()?;
    tracing::info!("Starting Camera Streams Demo");

    // ==== Stage 1: Session blueprint ====
    let mut blueprint = presets::camera_streams();
    if let Some(address) = std::env::args().nth(1) {
        blueprint.engine.backend = EngineBackend::Remote;
        blueprint.engine.address = address;
    }
    let frames: u64 = match std::env::var("FLIGHTSYNC_DEMO_FRAMES") {
        Ok(frames) => frames.parse()?,
        Err(_) => 250,
    };
    blueprint.frame_loop.max_frames = Some(frames);
    for warning in config_loader::ConfigLoader::warnings(&blueprint) {
        tracing::info!(%warning, "Blueprint note");
    }

    // ==== Stage 2: Assemble bridge, streams and loop ====
    let engine = Engine::from_config(&blueprint.engine);
    tracing::info!(backend = engine.backend_name(), frames, "Engine selected");
    let mut frame_loop = frame_loop::from_blueprint(&blueprint, engine).await?;

    // ==== Stage 3: Run until done or interrupted ====
    let stop = Arc::new(AtomicBool::new(false));
    let signal_stop = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_stop.store(true, Ordering::Relaxed);
        }
    });

    let outcome = frame_loop
        .run(blueprint.engine.scene, |_| !stop.load(Ordering::Relaxed))
        .await;
    let stats = frame_loop.finish(Some(Duration::from_secs(5))).await;

    print!("{}", stats.metrics.summary());
    for (stream, snapshot) in &stats.streams {
        println!(
            "{stream}: {} written, {} dropped, {} failed",
            snapshot.write_count, snapshot.dropped_count, snapshot.failure_count
        );
    }
    outcome?;
    Ok(())
}
