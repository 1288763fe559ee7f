//! SessionBlueprint - Config Loader 输出
//!
//! 描述一次渲染会话：引擎场景、载具与相机、静态结构、帧循环策略、输出流路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::{Validate, ValidationError};

use crate::{ChannelKind, ChannelMask, Pose, SceneId, Vector3};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的会话配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 引擎连接设置
    #[validate(nested)]
    pub engine: EngineConfig,

    /// 被渲染的载具
    #[validate(nested)]
    pub vehicle: VehicleConfig,

    /// 静态结构 (门框等)
    #[serde(default)]
    #[validate(nested)]
    pub static_structures: Vec<StaticStructureConfig>,

    /// 帧循环策略
    #[serde(default, rename = "loop")]
    #[validate(nested)]
    pub frame_loop: LoopConfig,

    /// 输出流路由
    #[serde(default)]
    #[validate(nested)]
    pub streams: Vec<StreamConfig>,
}

/// 引擎后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineBackend {
    /// 进程内合成渲染 (无需引擎)
    #[default]
    Mock,
    /// TCP 远程渲染引擎
    Remote,
}

/// 引擎配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// 场景
    #[serde(default)]
    pub scene: SceneId,

    /// 后端类型
    #[serde(default)]
    pub backend: EngineBackend,

    /// 远程引擎地址 (host:port)
    #[serde(default = "default_engine_address")]
    #[validate(length(min = 1, message = "engine address cannot be empty"))]
    pub address: String,

    /// 建立会话的超时 (毫秒)
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1, message = "connect_timeout_ms must be > 0"))]
    pub connect_timeout_ms: u64,

    /// 单帧渲染超时 (毫秒)，0 = 不限
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    /// Mock 后端的故障注入
    #[serde(default)]
    pub mock: MockEngineSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scene: SceneId::default(),
            backend: EngineBackend::default(),
            address: default_engine_address(),
            connect_timeout_ms: default_connect_timeout_ms(),
            render_timeout_ms: default_render_timeout_ms(),
            mock: MockEngineSettings::default(),
        }
    }
}

fn default_engine_address() -> String {
    "127.0.0.1:10253".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_render_timeout_ms() -> u64 {
    5_000
}

/// Mock 引擎故障注入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockEngineSettings {
    /// 拒绝建立会话
    #[serde(default)]
    pub refuse_connect: bool,

    /// 渲染失败的帧号
    #[serde(default)]
    pub fail_frames: Vec<u64>,

    /// 每帧模拟渲染耗时 (毫秒)
    #[serde(default)]
    pub render_delay_ms: u64,
}

/// 载具配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VehicleConfig {
    /// 唯一标识符
    #[validate(length(min = 1, message = "vehicle id cannot be empty"))]
    pub id: String,

    /// 可视化尺寸
    #[serde(default = "unit_scale")]
    pub size: Vector3,

    /// 初始位姿
    #[serde(default)]
    #[validate(custom(function = "validate_pose"))]
    pub initial_pose: Pose,

    /// 挂载的相机
    #[serde(default)]
    #[validate(nested)]
    pub camera: Option<CameraConfig>,
}

/// 相机配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CameraConfig {
    /// 唯一标识符
    #[validate(length(min = 1, message = "camera id cannot be empty"))]
    pub id: String,

    /// 相对于载具的挂载位姿
    #[serde(default)]
    #[validate(custom(function = "validate_pose"))]
    pub relative_pose: Pose,

    /// 视场角 (度)，(0, 180)
    #[validate(range(
        exclusive_min = 0.0,
        exclusive_max = 180.0,
        message = "fov_deg must be in (0, 180)"
    ))]
    pub fov_deg: f64,

    #[validate(range(min = 1, message = "width must be > 0"))]
    pub width: u32,

    #[validate(range(min = 1, message = "height must be > 0"))]
    pub height: u32,

    /// 输出通道
    #[serde(default)]
    pub channels: ChannelMask,
}

/// 静态结构配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StaticStructureConfig {
    #[validate(length(min = 1, message = "static structure id cannot be empty"))]
    pub id: String,

    /// 引擎侧预制体名称
    #[validate(length(min = 1, message = "prefab_id cannot be empty"))]
    pub prefab_id: String,

    #[serde(default = "unit_scale")]
    pub scale: Vector3,

    #[serde(default)]
    #[validate(custom(function = "validate_pose"))]
    pub pose: Pose,
}

fn unit_scale() -> Vector3 {
    Vector3::new(1.0, 1.0, 1.0)
}

/// 帧循环配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct LoopConfig {
    /// 最大帧数 (None = 不限)
    #[serde(default)]
    pub max_frames: Option<u64>,

    /// 节拍频率 (Hz)，None = 不限速
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0, message = "tick_rate_hz must be > 0"))]
    pub tick_rate_hz: Option<f64>,

    /// 渲染失败重试
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,

    /// 运动策略
    #[serde(default)]
    pub motion: MotionConfig,
}

/// 渲染失败重试配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RetryConfig {
    /// 同一帧的最大重试次数 (0 = 首次失败即终止)
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    #[validate(range(min = 1.0, message = "multiplier must be >= 1"))]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// 运动策略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionConfig {
    /// 保持初始状态
    #[default]
    Hold,
    /// z 轴在两个阈值之间往返
    VerticalOscillation { min_z: f64, max_z: f64, step: f64 },
}

/// 输出流配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StreamConfig {
    /// 流名称 (e.g., "/rgb")
    #[validate(length(min = 1, message = "stream name cannot be empty"))]
    pub name: String,

    /// 来源相机
    pub sensor_id: String,

    /// 来源通道
    pub channel: ChannelKind,

    /// 流类型
    pub stream_type: StreamType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1, message = "queue_capacity must be > 0"))]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    8
}

/// 输出流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    /// 日志输出
    Log,
    /// 文件输出
    File,
    /// 网络输出 (UDP)
    Network,
    /// 进程内广播
    Broadcast,
}

fn validate_pose(pose: &Pose) -> Result<(), ValidationError> {
    if pose.normalized().is_some() {
        Ok(())
    } else {
        let mut err = ValidationError::new("pose");
        err.message = Some("pose must be finite with a non-zero orientation".into());
        Err(err)
    }
}

impl SessionBlueprint {
    /// The camera of the vehicle, if any.
    pub fn camera(&self) -> Option<&CameraConfig> {
        self.vehicle.camera.as_ref()
    }

    /// Streams whose route points at an enabled channel of a known camera.
    pub fn active_streams(&self) -> impl Iterator<Item = &StreamConfig> {
        self.streams.iter().filter(move |stream| {
            self.camera().is_some_and(|camera| {
                camera.id == stream.sensor_id && camera.channels.is_enabled(stream.channel)
            })
        })
    }

    /// One log stream per enabled channel, using the default stream names.
    pub fn default_streams(&self) -> Vec<StreamConfig> {
        let Some(camera) = self.camera() else {
            return Vec::new();
        };
        camera
            .channels
            .enabled()
            .map(|channel| StreamConfig {
                name: channel.default_stream_name().to_string(),
                sensor_id: camera.id.clone(),
                channel,
                stream_type: StreamType::Log,
                queue_capacity: default_queue_capacity(),
                params: HashMap::new(),
            })
            .collect()
    }
}
