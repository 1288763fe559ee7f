//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, SessionBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<SessionBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<SessionBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<SessionBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ChannelKind, EngineBackend, MotionConfig, SceneId, StreamType};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[engine]
scene = "warehouse"

[vehicle]
id = "quad"
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.engine.scene, SceneId::Warehouse);
        assert_eq!(bp.engine.backend, EngineBackend::Mock);
        assert_eq!(bp.engine.render_timeout_ms, 5_000);
        assert_eq!(bp.vehicle.size.x, 1.0);
        assert!(bp.vehicle.camera.is_none());
        assert!(bp.streams.is_empty());
        assert_eq!(bp.frame_loop.retry.max_retries, 0);
    }

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[engine]
scene = "industrial"
backend = "remote"
address = "10.0.0.2:10253"

[vehicle]
id = "quad"
size = { x = 0.5, y = 0.5, z = 0.5 }

[vehicle.camera]
id = "rgb_camera"
fov_deg = 90.0
width = 640
height = 360
relative_pose = { position = { x = 0.0, y = -2.0, z = 0.0 }, orientation = { w = 1.0, x = 0.0, y = 0.0, z = 0.0 } }
channels = { depth = true }

[[static_structures]]
id = "unity_gate"
prefab_id = "rpg_gate"

[loop]
max_frames = 100
tick_rate_hz = 50.0

[loop.motion]
kind = "vertical_oscillation"
min_z = 0.0
max_z = 5.0
step = 0.1

[[streams]]
name = "/depth"
sensor_id = "rgb_camera"
channel = "depth"
stream_type = "file"
params = { base_path = "./output" }
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.engine.backend, EngineBackend::Remote);
        let camera = bp.camera().unwrap();
        assert!(camera.channels.color);
        assert!(camera.channels.depth);
        assert!(!camera.channels.optical_flow);
        assert_eq!(bp.static_structures[0].prefab_id, "rpg_gate");
        assert_eq!(bp.frame_loop.max_frames, Some(100));
        assert!(matches!(
            bp.frame_loop.motion,
            MotionConfig::VerticalOscillation { .. }
        ));
        assert_eq!(bp.streams[0].channel, ChannelKind::Depth);
        assert_eq!(bp.streams[0].stream_type, StreamType::File);
        assert_eq!(bp.streams[0].queue_capacity, 8);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "engine": { "scene": "tunnels" },
            "vehicle": {
                "id": "quad",
                "camera": { "id": "cam", "fov_deg": 60.0, "width": 32, "height": 24 }
            },
            "streams": [
                { "name": "/rgb", "sensor_id": "cam", "channel": "color", "stream_type": "log" }
            ]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.engine.scene, SceneId::Tunnels);
        assert_eq!(bp.streams.len(), 1);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_scene_rejected() {
        let err = parse_toml("[engine]\nscene = \"moon\"\n[vehicle]\nid = \"quad\"\n").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
