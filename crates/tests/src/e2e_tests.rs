//! Configuration to published images, end to end

use std::time::Duration;

use config_loader::{presets, ConfigFormat, ConfigLoader};
use contracts::{ChannelKind, ChannelMask, SceneId};
use engine_bridge::{EngineBridge, MockEngine, MockEngineConfig};
use frame_loop::{from_blueprint, FrameLoop, TerminationReason};
use publisher::OutputPublisher;

use crate::support::{quad, RecordingStream, CAMERA};

/// TOML blueprint -> mock engine -> file stream on disk
#[tokio::test]
async fn test_e2e_toml_to_files() {
    let dir = tempfile::tempdir().unwrap();
    let toml = format!(
        r#"
[engine]
scene = "nature_forest"

[vehicle]
id = "quad"
size = {{ x = 0.5, y = 0.5, z = 0.5 }}

[vehicle.camera]
id = "rgb_camera"
relative_pose = {{ position = {{ x = 0.0, y = -2.0, z = 0.0 }} }}
fov_deg = 90.0
width = 16
height = 9
channels = {{ depth = true }}

[loop]
max_frames = 3

[loop.motion]
kind = "vertical_oscillation"
min_z = 0.0
max_z = 5.0
step = 0.1

[[streams]]
name = "/rgb"
sensor_id = "rgb_camera"
channel = "color"
stream_type = "file"
params = {{ base_path = "{base}", save_metadata = "true" }}

[[streams]]
name = "/depth"
sensor_id = "rgb_camera"
channel = "depth"
stream_type = "file"
params = {{ base_path = "{base}" }}

[[streams]]
name = "/segmentation"
sensor_id = "rgb_camera"
channel = "segmentation"
stream_type = "log"
"#,
        base = dir.path().display()
    );

    let blueprint = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
    assert_eq!(ConfigLoader::warnings(&blueprint).len(), 1);

    let mut frame_loop = from_blueprint(&blueprint, MockEngine::new()).await.unwrap();
    let stats = frame_loop
        .run(blueprint.engine.scene, |_| true)
        .await
        .unwrap();
    assert_eq!(stats.frames_published, 3);
    assert_eq!(stats.termination, Some(TerminationReason::MaxFrames));

    let stats = frame_loop.finish(Some(Duration::from_secs(5))).await;
    // segmentation is not rendered, so its stream was never opened
    assert_eq!(stats.streams.len(), 2);
    for (_, snapshot) in &stats.streams {
        assert_eq!(snapshot.write_count, 3);
        assert_eq!(snapshot.failure_count, 0);
    }

    for frame_id in 0..3 {
        assert!(dir.path().join(format!("rgb/{frame_id}.png")).exists());
        assert!(dir.path().join(format!("rgb/{frame_id}.json")).exists());
        assert!(dir.path().join(format!("depth/{frame_id}.png")).exists());
    }
    assert!(!dir.path().join("segmentation").exists());
}

/// A failing stream neither stops the loop nor the other streams
#[tokio::test]
async fn test_failing_stream_is_isolated() {
    let mut bridge = EngineBridge::new(MockEngine::new());
    let handle = bridge.add_vehicle(quad(ChannelMask::ALL)).unwrap();

    let mut publisher = OutputPublisher::new();
    publisher
        .add_stream(CAMERA, ChannelKind::Color, RecordingStream::failing("/rgb"), 16)
        .unwrap();
    let (depth, depth_recording) = RecordingStream::new("/depth");
    publisher
        .add_stream(CAMERA, ChannelKind::Depth, depth, 16)
        .unwrap();

    let mut frame_loop = FrameLoop::new(bridge, handle, publisher)
        .unwrap()
        .with_max_frames(Some(5));
    let stats = frame_loop.run(SceneId::Industrial, |_| true).await.unwrap();
    assert_eq!(stats.frames_published, 5);
    // segmentation and optical flow have no route
    assert_eq!(stats.channels_unrouted, 10);

    let stats = frame_loop.finish(None).await;
    let rgb = stats.streams.iter().find(|(name, _)| name == "/rgb").unwrap().1;
    let depth = stats.streams.iter().find(|(name, _)| name == "/depth").unwrap().1;
    assert_eq!(rgb.failure_count, 5);
    assert_eq!(rgb.write_count, 0);
    assert_eq!(depth.write_count, 5);
    assert_eq!(depth_recording.frame_ids(), vec![0, 1, 2, 3, 4]);
}

/// Broadcast subscribers see every frame in order
#[tokio::test]
async fn test_broadcast_subscriber_receives_frames() {
    let mut bridge = EngineBridge::new(MockEngine::new());
    let handle = bridge.add_vehicle(quad(ChannelMask::COLOR_ONLY)).unwrap();

    let mut publisher = OutputPublisher::new();
    let mut rx = publisher
        .add_broadcast(CAMERA, ChannelKind::Color, "/rgb", 16)
        .unwrap();

    let mut frame_loop = FrameLoop::new(bridge, handle, publisher)
        .unwrap()
        .with_max_frames(Some(3));
    frame_loop.run(SceneId::Industrial, |_| true).await.unwrap();
    frame_loop.finish(None).await;

    for expected in 0..3u64 {
        let image = rx.recv().await.unwrap();
        assert_eq!(image.frame_id, expected);
        assert_eq!(image.stream, "/rgb");
        assert_eq!((image.width, image.height), (8, 4));
    }
}

/// Gate preset: the manifest carries the static structure, no image is produced
#[tokio::test]
async fn test_static_gate_preset_session() {
    let mut blueprint = presets::static_gate();
    blueprint.frame_loop.max_frames = Some(2);
    blueprint.frame_loop.tick_rate_hz = None;

    let engine = MockEngine::with_config(MockEngineConfig::default());
    let log = engine.call_log();
    let mut frame_loop = from_blueprint(&blueprint, engine).await.unwrap();
    let stats = frame_loop.run(SceneId::Industrial, |_| true).await.unwrap();

    assert_eq!(stats.frames_published, 2);
    assert_eq!(stats.channels_published, 0);
    assert!(matches!(
        log.calls().first(),
        Some(engine_bridge::EngineCall::Connect {
            static_structures: 1,
            cameras: 0,
            ..
        })
    ));
    frame_loop.finish(None).await;
}
