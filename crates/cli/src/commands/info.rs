//! `info` command implementation.

use config_loader::{presets, SessionBlueprint};
use contracts::SessionManifest;
use engine_bridge::MockEngine;
use serde::Serialize;

use super::load_blueprint;
use crate::cli::InfoArgs;
use crate::error::Result;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    source: String,
    version: String,
    engine: EngineInfo,
    vehicle: VehicleInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    static_structures: Vec<StructureInfo>,
    frame_loop: LoopInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    streams: Vec<StreamInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<SessionManifest>,
}

#[derive(Serialize)]
struct EngineInfo {
    scene: String,
    backend: String,
    address: String,
    connect_timeout_ms: u64,
    render_timeout_ms: u64,
}

#[derive(Serialize)]
struct VehicleInfo {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    camera: Option<CameraInfo>,
}

#[derive(Serialize)]
struct CameraInfo {
    id: String,
    fov_deg: f64,
    width: u32,
    height: u32,
    channels: Vec<String>,
}

#[derive(Serialize)]
struct StructureInfo {
    id: String,
    prefab_id: String,
}

#[derive(Serialize)]
struct LoopInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick_rate_hz: Option<f64>,
    max_retries: u32,
    motion: String,
}

#[derive(Serialize)]
struct StreamInfo {
    name: String,
    route: String,
    stream_type: String,
    active: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    if args.list_presets {
        for name in presets::NAMES {
            println!("{name}");
        }
        return Ok(());
    }

    let (blueprint, source) = load_blueprint(&args.source)?;
    let manifest = if args.manifest {
        Some(session_manifest(&blueprint)?)
    } else {
        None
    };

    if args.json {
        let info = build_config_info(&blueprint, source, args.streams, manifest);
        let json = serde_json::to_string_pretty(&info)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config info: {e}"))?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, &source, args.streams);
        if let Some(manifest) = manifest {
            let json = serde_json::to_string_pretty(&manifest)
                .map_err(|e| anyhow::anyhow!("Failed to serialize manifest: {e}"))?;
            println!("🧾 Session manifest\n{}\n", json);
        }
    }

    Ok(())
}

/// Manifest the engine receives on connect, built without contacting it
fn session_manifest(blueprint: &SessionBlueprint) -> Result<SessionManifest> {
    let (bridge, _) = frame_loop::session::build_bridge(blueprint, MockEngine::new())?;
    Ok(bridge.manifest())
}

fn build_config_info(
    blueprint: &SessionBlueprint,
    source: String,
    with_streams: bool,
    manifest: Option<SessionManifest>,
) -> ConfigInfo {
    let engine = &blueprint.engine;
    let camera = blueprint.camera().map(|c| CameraInfo {
        id: c.id.clone(),
        fov_deg: c.fov_deg,
        width: c.width,
        height: c.height,
        channels: c.channels.enabled().map(|ch| ch.to_string()).collect(),
    });

    let streams = if with_streams {
        let active: Vec<&str> = blueprint.active_streams().map(|s| s.name.as_str()).collect();
        blueprint
            .streams
            .iter()
            .map(|s| StreamInfo {
                name: s.name.clone(),
                route: format!("{}/{}", s.sensor_id, s.channel),
                stream_type: format!("{:?}", s.stream_type),
                active: active.contains(&s.name.as_str()),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        source,
        version: format!("{:?}", blueprint.version),
        engine: EngineInfo {
            scene: engine.scene.to_string(),
            backend: format!("{:?}", engine.backend),
            address: engine.address.clone(),
            connect_timeout_ms: engine.connect_timeout_ms,
            render_timeout_ms: engine.render_timeout_ms,
        },
        vehicle: VehicleInfo {
            id: blueprint.vehicle.id.clone(),
            camera,
        },
        static_structures: blueprint
            .static_structures
            .iter()
            .map(|s| StructureInfo {
                id: s.id.clone(),
                prefab_id: s.prefab_id.clone(),
            })
            .collect(),
        frame_loop: LoopInfo {
            max_frames: blueprint.frame_loop.max_frames,
            tick_rate_hz: blueprint.frame_loop.tick_rate_hz,
            max_retries: blueprint.frame_loop.retry.max_retries,
            motion: format!("{:?}", blueprint.frame_loop.motion),
        },
        streams,
        manifest,
    }
}

fn print_config_info(blueprint: &SessionBlueprint, source: &str, with_streams: bool) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                flightsync Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let engine = &blueprint.engine;
    println!("📍 Engine");
    println!("   ├─ Source: {}", source);
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Scene: {}", engine.scene);
    println!("   ├─ Backend: {:?}", engine.backend);
    println!("   ├─ Address: {}", engine.address);
    if engine.render_timeout_ms == 0 {
        println!("   └─ Render timeout: unbounded");
    } else {
        println!("   └─ Render timeout: {} ms", engine.render_timeout_ms);
    }

    let vehicle = &blueprint.vehicle;
    println!("\n🚁 Vehicle");
    println!("   ├─ {} ", vehicle.id);
    match &vehicle.camera {
        Some(camera) => {
            let channels: Vec<String> =
                camera.channels.enabled().map(|ch| ch.to_string()).collect();
            println!(
                "   └─ 📷 {} ({}x{}, fov {}°, channels: {})",
                camera.id,
                camera.width,
                camera.height,
                camera.fov_deg,
                channels.join(", ")
            );
        }
        None => println!("   └─ no camera"),
    }

    if !blueprint.static_structures.is_empty() {
        println!("\n🧱 Static structures ({})", blueprint.static_structures.len());
        for (i, structure) in blueprint.static_structures.iter().enumerate() {
            let is_last = i == blueprint.static_structures.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let p = structure.pose.position;
            println!(
                "   {} {} ({}) at ({}, {}, {})",
                prefix, structure.id, structure.prefab_id, p.x, p.y, p.z
            );
        }
    }

    let frame_loop = &blueprint.frame_loop;
    println!("\n⚙️  Frame loop");
    match frame_loop.max_frames {
        Some(max) => println!("   ├─ Max frames: {}", max),
        None => println!("   ├─ Max frames: unlimited"),
    }
    match frame_loop.tick_rate_hz {
        Some(hz) => println!("   ├─ Tick rate: {} Hz", hz),
        None => println!("   ├─ Tick rate: unpaced"),
    }
    println!("   ├─ Render retries: {}", frame_loop.retry.max_retries);
    println!("   └─ Motion: {:?}", frame_loop.motion);

    if with_streams && !blueprint.streams.is_empty() {
        let active: Vec<&str> = blueprint.active_streams().map(|s| s.name.as_str()).collect();
        println!("\n📤 Streams ({})", blueprint.streams.len());
        for (i, stream) in blueprint.streams.iter().enumerate() {
            let is_last = i == blueprint.streams.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let idle = if active.contains(&stream.name.as_str()) {
                ""
            } else {
                " [idle]"
            };
            println!(
                "   {} {} <- {}/{} ({:?}){}",
                prefix, stream.name, stream.sensor_id, stream.channel, stream.stream_type, idle
            );
        }
    }

    println!();
}
