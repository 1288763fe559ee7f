//! `run` command implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use config_loader::{ConfigLoader, SessionBlueprint};
use contracts::{EngineBackend, SceneId};
use tracing::{error, info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let (mut blueprint, origin) = load_blueprint(&args.source)?;

    apply_overrides(&mut blueprint, args);
    // overrides bypassed the loader, check again
    ConfigLoader::validate(&blueprint).map_err(CliError::Config)?;
    for warning in ConfigLoader::warnings(&blueprint) {
        warn!(%warning, "Configuration warning");
    }

    info!(
        source = %origin,
        scene = %blueprint.engine.scene,
        backend = ?blueprint.engine.backend,
        vehicle = %blueprint.vehicle.id,
        static_structures = blueprint.static_structures.len(),
        streams = blueprint.streams.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        drain_timeout: (args.drain_timeout_ms > 0)
            .then(|| Duration::from_millis(args.drain_timeout_ms)),
    });

    // Stop between frames so every stream drains
    let stop = Arc::new(AtomicBool::new(false));
    let signal_stop = Arc::clone(&stop);
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping after the current frame...");
        signal_stop.store(true, Ordering::Relaxed);
    });

    info!("Starting frame loop...");
    let outcome = pipeline.run(stop).await;
    signal_task.abort();

    let stats = match outcome {
        Ok(stats) => stats,
        Err(failure) => {
            failure.stats.print_summary();
            return Err(failure.error);
        }
    };

    info!(
        frames = stats.loop_stats.frames_published,
        duration_secs = stats.loop_stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.loop_stats.fps()),
        "Frame loop completed successfully"
    );
    stats.print_summary();

    info!("flightsync finished");
    Ok(())
}

/// Apply command-line overrides on top of the loaded blueprint
fn apply_overrides(blueprint: &mut SessionBlueprint, args: &RunArgs) {
    if args.mock {
        info!("Forcing the in-process mock engine");
        blueprint.engine.backend = EngineBackend::Mock;
    }
    if let Some(ref address) = args.address {
        info!(address = %address, "Overriding engine address from CLI");
        blueprint.engine.address = address.clone();
    }
    if let Some(scene) = args.scene {
        let scene = SceneId::from(scene);
        info!(%scene, "Overriding scene from CLI");
        blueprint.engine.scene = scene;
    }
    if let Some(max_frames) = args.max_frames {
        blueprint.frame_loop.max_frames = (max_frames > 0).then_some(max_frames);
    }
    if let Some(tick_rate) = args.tick_rate {
        blueprint.frame_loop.tick_rate_hz = (tick_rate > 0.0).then_some(tick_rate);
    }
    if let Some(max_retries) = args.max_retries {
        blueprint.frame_loop.retry.max_retries = max_retries;
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &SessionBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Engine:");
    println!("  Scene: {}", blueprint.engine.scene);
    println!("  Backend: {:?}", blueprint.engine.backend);
    println!("  Address: {}", blueprint.engine.address);

    let vehicle = &blueprint.vehicle;
    println!("\nVehicle:");
    println!(
        "  {} - size ({}, {}, {})",
        vehicle.id, vehicle.size.x, vehicle.size.y, vehicle.size.z
    );
    match &vehicle.camera {
        Some(camera) => println!(
            "  Camera {}: {}x{}, fov {} deg, {} channel(s)",
            camera.id,
            camera.width,
            camera.height,
            camera.fov_deg,
            camera.channels.count()
        ),
        None => println!("  No camera"),
    }

    if !blueprint.static_structures.is_empty() {
        println!("\nStatic structures ({}):", blueprint.static_structures.len());
        for structure in &blueprint.static_structures {
            println!("  - {} ({})", structure.id, structure.prefab_id);
        }
    }

    if !blueprint.streams.is_empty() {
        println!("\nStreams ({}):", blueprint.streams.len());
        for stream in &blueprint.streams {
            println!(
                "  - {} <- {}/{} ({:?})",
                stream.name, stream.sensor_id, stream.channel, stream.stream_type
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{SceneArg, SourceArgs};
    use config_loader::presets;

    fn args() -> RunArgs {
        RunArgs {
            source: SourceArgs {
                config: None,
                preset: Some("camera_streams".into()),
            },
            mock: false,
            address: None,
            scene: None,
            max_frames: None,
            tick_rate: None,
            max_retries: None,
            dry_run: false,
            drain_timeout_ms: 5000,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut bp = presets::camera_streams();
        bp.engine.backend = EngineBackend::Remote;

        let mut args = args();
        args.mock = true;
        args.scene = Some(SceneArg::Tunnels);
        args.address = Some("10.0.0.2:10253".into());
        args.max_frames = Some(20);
        args.tick_rate = Some(0.0);
        args.max_retries = Some(2);
        apply_overrides(&mut bp, &args);

        assert_eq!(bp.engine.backend, EngineBackend::Mock);
        assert_eq!(bp.engine.scene, SceneId::Tunnels);
        assert_eq!(bp.engine.address, "10.0.0.2:10253");
        assert_eq!(bp.frame_loop.max_frames, Some(20));
        assert_eq!(bp.frame_loop.tick_rate_hz, None);
        assert_eq!(bp.frame_loop.retry.max_retries, 2);
    }

    #[test]
    fn test_zero_max_frames_means_unlimited() {
        let mut bp = presets::camera_streams();
        bp.frame_loop.max_frames = Some(5);
        let mut args = args();
        args.max_frames = Some(0);
        apply_overrides(&mut bp, &args);
        assert_eq!(bp.frame_loop.max_frames, None);
    }

    #[tokio::test]
    async fn test_run_mock_preset() {
        let mut args = args();
        args.mock = true;
        args.max_frames = Some(3);
        args.tick_rate = Some(0.0);
        assert!(run_pipeline(&args).await.is_ok());
    }

    #[tokio::test]
    async fn test_refused_connect_exits_with_connection_code() {
        let toml = r#"
[engine]
backend = "mock"
mock = { refuse_connect = true }

[vehicle]
id = "quad"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refuse.toml");
        std::fs::write(&path, toml).unwrap();

        let mut args = args();
        args.source = SourceArgs {
            config: Some(path),
            preset: None,
        };
        let err = run_pipeline(&args).await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_render_failure_exits_with_render_code() {
        let toml = r#"
[engine]
mock = { fail_frames = [2] }

[vehicle]
id = "quad"

[loop]
max_frames = 10
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fail.toml");
        std::fs::write(&path, toml).unwrap();

        let mut args = args();
        args.source = SourceArgs {
            config: Some(path),
            preset: None,
        };
        let err = run_pipeline(&args).await.unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
