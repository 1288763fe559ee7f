//! Static Gate Example
//!
//! Places a quadrotor and a race gate in the industrial scene, then holds the
//! vehicle in front of the gate. Entities are built by hand to show the
//! registration API; no camera and no stream is involved.
//!
//! Run with the mock engine:   cargo run -p demos --bin static_gate
//! Run against an engine:      cargo run -p demos --bin static_gate -- 127.0.0.1:10253 [frames]

use std::time::Duration;

use contracts::{EngineBackend, EngineConfig, Pose, Quaternion, SceneId, Vector3};
use engine_bridge::{Engine, EngineBridge};
use entities::{EntityProxy, StaticStructure};
use frame_loop::{FrameLoop, HoldState};
use publisher::OutputPublisher;

/// Yaw of 180 degrees about z
const FACING_BACK: Quaternion = Quaternion::new(0.0, 0.0, 0.0, 1.0);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init()?;
    tracing::info!("Starting Static Gate Demo");

    // ==== Stage 1: Pick the engine ====
    let mut args = std::env::args().skip(1);
    let mut engine_config = EngineConfig::default();
    if let Some(address) = args.next() {
        engine_config.backend = EngineBackend::Remote;
        engine_config.address = address;
    }
    let frames: u64 = match args.next() {
        Some(frames) => frames.parse()?,
        None => 100,
    };
    let engine = Engine::from_config(&engine_config);
    tracing::info!(backend = engine.backend_name(), frames, "Engine selected");

    // ==== Stage 2: Register entities before connecting ====
    let mut bridge = EngineBridge::new(engine)
        .with_connect_timeout(Duration::from_millis(engine_config.connect_timeout_ms))
        .with_render_timeout(Duration::from_millis(engine_config.render_timeout_ms));

    let mut gate = StaticStructure::new("unity_gate", "rpg_gate");
    gate.set_position(Vector3::new(5.0, 0.0, 2.5))?;
    gate.set_orientation(FACING_BACK)?;
    bridge.add_static_structure(gate)?;

    let mut quad = EntityProxy::vehicle("quad", Vector3::new(0.5, 0.5, 0.5));
    quad.set_pose(Pose::new(Vector3::new(0.0, 0.0, 2.0), FACING_BACK))?;
    let handle = bridge.add_vehicle(quad)?;

    // ==== Stage 3: Hold the pose for a while ====
    let mut frame_loop = FrameLoop::new(bridge, handle, OutputPublisher::new())?
        .with_motion(HoldState)
        .with_max_frames(Some(frames))
        .with_tick_rate(Some(50.0));

    let outcome = frame_loop.run(SceneId::Industrial, |_| true).await;
    let stats = frame_loop.finish(None).await;

    tracing::info!(
        frames = stats.frames_published,
        fps = format!("{:.2}", stats.fps()),
        termination = ?stats.termination,
        "Static Gate Demo finished"
    );
    outcome?;
    Ok(())
}
