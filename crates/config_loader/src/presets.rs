//! Built-in session blueprints
//!
//! 与示例程序一致的默认会话，CLI `info --preset` 和 demos 使用。

use std::collections::HashMap;

use contracts::{
    CameraConfig, ChannelKind, ChannelMask, ConfigVersion, EngineConfig, LoopConfig,
    MotionConfig, Pose, Quaternion, SessionBlueprint, StaticStructureConfig, StreamConfig,
    StreamType, Vector3, VehicleConfig,
};

/// Quadrotor with a forward camera, bouncing between z = 0 and z = 5 at 50 Hz.
///
/// The camera renders color and depth; four log streams are declared, so
/// `/segmentation` and `/opticalflow` stay idle until their channels are
/// enabled.
pub fn camera_streams() -> SessionBlueprint {
    let camera_id = "rgb_camera";
    SessionBlueprint {
        version: ConfigVersion::V1,
        engine: EngineConfig::default(),
        vehicle: VehicleConfig {
            id: "quad".to_string(),
            size: Vector3::new(0.5, 0.5, 0.5),
            initial_pose: Pose::zero(),
            camera: Some(CameraConfig {
                id: camera_id.to_string(),
                relative_pose: Pose::from_position(0.0, -2.0, 0.0),
                fov_deg: 90.0,
                width: 640,
                height: 360,
                channels: ChannelMask::from_post_processing([true, false, false]),
            }),
        },
        static_structures: Vec::new(),
        frame_loop: LoopConfig {
            max_frames: None,
            tick_rate_hz: Some(50.0),
            motion: MotionConfig::VerticalOscillation {
                min_z: 0.0,
                max_z: 5.0,
                step: 0.1,
            },
            ..Default::default()
        },
        streams: ChannelKind::ALL
            .into_iter()
            .map(|channel| StreamConfig {
                name: channel.default_stream_name().to_string(),
                sensor_id: camera_id.to_string(),
                channel,
                stream_type: StreamType::Log,
                queue_capacity: 8,
                params: HashMap::new(),
            })
            .collect(),
    }
}

/// Quadrotor hovering at z = 2 facing a gate placed 5 m ahead.
pub fn static_gate() -> SessionBlueprint {
    let yaw_180 = Quaternion::new(0.0, 0.0, 0.0, 1.0);
    SessionBlueprint {
        version: ConfigVersion::V1,
        engine: EngineConfig::default(),
        vehicle: VehicleConfig {
            id: "quad".to_string(),
            size: Vector3::new(0.5, 0.5, 0.5),
            initial_pose: Pose::new(Vector3::new(0.0, 0.0, 2.0), yaw_180),
            camera: None,
        },
        static_structures: vec![StaticStructureConfig {
            id: "unity_gate".to_string(),
            prefab_id: "rpg_gate".to_string(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            pose: Pose::new(Vector3::new(5.0, 0.0, 2.5), yaw_180),
        }],
        frame_loop: LoopConfig::default(),
        streams: Vec::new(),
    }
}

/// Preset by name
pub fn by_name(name: &str) -> Option<SessionBlueprint> {
    match name {
        "camera_streams" => Some(camera_streams()),
        "static_gate" => Some(static_gate()),
        _ => None,
    }
}

/// Names accepted by [`by_name`]
pub const NAMES: [&str; 2] = ["camera_streams", "static_gate"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_preset_matches_demo() {
        let bp = camera_streams();
        let camera = bp.camera().unwrap();
        assert_eq!((camera.width, camera.height), (640, 360));
        assert!(camera.channels.color && camera.channels.depth);
        assert_eq!(bp.streams.len(), 4);
        assert_eq!(bp.active_streams().count(), 2);
    }

    #[test]
    fn test_by_name() {
        for name in NAMES {
            assert!(by_name(name).is_some());
        }
        assert!(by_name("moon_base").is_none());
    }
}
