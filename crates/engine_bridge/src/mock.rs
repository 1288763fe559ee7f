//! Mock 渲染引擎
//!
//! 进程内合成图像，用于测试、demo 和 CLI `--mock` 模式。支持注入失败场景，
//! 并记录所有调用以便断言调用顺序。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    CameraDescriptor, ChannelKind, ContractError, EngineSession, EntityPose, FrameId, FrameRequest,
    MockEngineSettings, RawImage, RenderOutputSet, SceneId, SensorOutputs, SessionManifest,
};
use tracing::{debug, instrument};

/// Mock 引擎配置
#[derive(Debug, Default, Clone)]
pub struct MockEngineConfig {
    /// 拒绝会话 (`connect` returns false)
    pub refuse_connect: bool,
    /// 每次请求都渲染失败的帧
    pub fail_frames: Vec<FrameId>,
    /// 仅首次请求失败的帧（重试后成功）
    pub transient_failures: Vec<FrameId>,
    /// 在该帧上报告会话丢失
    pub lose_session_at: Option<FrameId>,
    /// 每帧渲染耗时
    pub render_delay: Duration,
}

impl From<&MockEngineSettings> for MockEngineConfig {
    fn from(settings: &MockEngineSettings) -> Self {
        Self {
            refuse_connect: settings.refuse_connect,
            fail_frames: settings.fail_frames.clone(),
            render_delay: Duration::from_millis(settings.render_delay_ms),
            ..Default::default()
        }
    }
}

/// One call received by the mock engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Connect {
        scene: SceneId,
        vehicles: usize,
        static_structures: usize,
        cameras: usize,
    },
    RequestFrame {
        frame_id: FrameId,
        poses: Vec<EntityPose>,
    },
    CollectOutputs {
        frame_id: Option<FrameId>,
    },
    Disconnect,
}

/// Shared, cloneable view of the calls a [`MockEngine`] received
#[derive(Debug, Clone, Default)]
pub struct EngineCallLog {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl EngineCallLog {
    /// Snapshot of every call so far, in arrival order
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Frame ids of every `request_frame` call
    pub fn requested_frames(&self) -> Vec<FrameId> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                EngineCall::RequestFrame { frame_id, .. } => Some(*frame_id),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: EngineCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

/// Mock 渲染引擎
///
/// Renders every channel for every camera; the bridge is responsible for
/// dropping the ones a camera did not enable.
pub struct MockEngine {
    config: MockEngineConfig,
    log: EngineCallLog,
    connected: bool,
    cameras: Vec<CameraDescriptor>,
    /// transient failures already triggered
    failed_once: HashSet<FrameId>,
    rendered: Option<RenderOutputSet>,
    /// frames rendered per frame id (includes retries)
    render_counts: HashMap<FrameId, u32>,
}

impl MockEngine {
    /// 创建默认 mock 引擎
    pub fn new() -> Self {
        Self::with_config(MockEngineConfig::default())
    }

    /// 使用配置创建 mock 引擎
    pub fn with_config(config: MockEngineConfig) -> Self {
        Self {
            config,
            log: EngineCallLog::default(),
            connected: false,
            cameras: Vec::new(),
            failed_once: HashSet::new(),
            rendered: None,
            render_counts: HashMap::new(),
        }
    }

    /// Handle to the call log; stays valid after the engine moves into a bridge.
    pub fn call_log(&self) -> EngineCallLog {
        self.log.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// How many times `frame_id` was rendered successfully
    pub fn render_count(&self, frame_id: FrameId) -> u32 {
        self.render_counts.get(&frame_id).copied().unwrap_or(0)
    }

    fn ensure_connected(&self) -> Result<(), ContractError> {
        if self.connected {
            Ok(())
        } else {
            Err(ContractError::EngineSessionLost {
                message: "mock engine is not connected".into(),
            })
        }
    }

    fn render(&self, request: &FrameRequest) -> RenderOutputSet {
        // 高度影响合成图像，方便肉眼确认姿态已推送
        let altitude = request
            .vehicles
            .first()
            .map(|v| v.pose.position.z)
            .unwrap_or_default();

        let mut outputs = RenderOutputSet::new(request.frame_id);
        for camera in &self.cameras {
            let mut sensor = SensorOutputs::new(camera.id.clone());
            for channel in ChannelKind::ALL {
                sensor.channels.insert(
                    channel,
                    synthetic_image(channel, camera.width, camera.height, request.frame_id, altitude),
                );
            }
            outputs.sensors.push(sensor);
        }
        outputs
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineSession for MockEngine {
    #[instrument(
        name = "mock_engine_connect",
        skip(self, manifest),
        fields(scene = %scene, cameras = manifest.camera_count())
    )]
    async fn connect(
        &mut self,
        scene: SceneId,
        manifest: &SessionManifest,
    ) -> Result<bool, ContractError> {
        self.log.push(EngineCall::Connect {
            scene,
            vehicles: manifest.vehicles.len(),
            static_structures: manifest.static_structures.len(),
            cameras: manifest.camera_count(),
        });

        if self.config.refuse_connect {
            debug!("refusing session");
            return Ok(false);
        }

        self.cameras = manifest.cameras().cloned().collect();
        self.connected = true;
        Ok(true)
    }

    #[instrument(
        name = "mock_engine_request_frame",
        skip(self, request),
        fields(frame_id = request.frame_id)
    )]
    async fn request_frame(&mut self, request: &FrameRequest) -> Result<(), ContractError> {
        self.log.push(EngineCall::RequestFrame {
            frame_id: request.frame_id,
            poses: request.vehicles.clone(),
        });
        self.ensure_connected()?;
        self.rendered = None;

        if !self.config.render_delay.is_zero() {
            tokio::time::sleep(self.config.render_delay).await;
        }

        let frame_id = request.frame_id;
        if self.config.lose_session_at == Some(frame_id) {
            self.connected = false;
            return Err(ContractError::EngineSessionLost {
                message: format!("mock session dropped at frame {frame_id}"),
            });
        }
        if self.config.fail_frames.contains(&frame_id) {
            return Err(ContractError::render_failed(frame_id, "mock failure"));
        }
        if self.config.transient_failures.contains(&frame_id) && self.failed_once.insert(frame_id)
        {
            return Err(ContractError::render_failed(frame_id, "mock transient failure"));
        }

        self.rendered = Some(self.render(request));
        *self.render_counts.entry(frame_id).or_default() += 1;
        Ok(())
    }

    #[instrument(name = "mock_engine_collect_outputs", skip(self))]
    async fn collect_outputs(&mut self) -> Result<RenderOutputSet, ContractError> {
        self.log.push(EngineCall::CollectOutputs {
            frame_id: self.rendered.as_ref().map(|r| r.frame_id),
        });
        self.ensure_connected()?;
        self.rendered
            .take()
            .ok_or_else(|| ContractError::Other("no rendered frame is pending".into()))
    }

    #[instrument(name = "mock_engine_disconnect", skip(self))]
    async fn disconnect(&mut self) -> Result<(), ContractError> {
        // 幂等：未连接也返回 Ok
        if self.connected {
            self.log.push(EngineCall::Disconnect);
            self.connected = false;
        }
        Ok(())
    }
}

/// Deterministic test pattern for one channel
fn synthetic_image(
    channel: ChannelKind,
    width: u32,
    height: u32,
    frame_id: FrameId,
    altitude: f64,
) -> RawImage {
    let layout = channel.layout();
    let pixels = width as usize * height as usize;
    let shade = (frame_id % 256) as u8;

    let data = match channel {
        ChannelKind::Color => {
            let mut buf = Vec::with_capacity(pixels * 3);
            for y in 0..height {
                for x in 0..width {
                    // B, G, R
                    buf.push(shade);
                    buf.push((y * 255 / height.max(1)) as u8);
                    buf.push((x * 255 / width.max(1)) as u8);
                }
            }
            Bytes::from(buf)
        }
        ChannelKind::Depth => {
            let base = 1.0 + altitude.max(0.0) as f32;
            let depth: Vec<f32> = (0..height)
                .flat_map(|y| (0..width).map(move |x| base + (x + y) as f32 * 0.01))
                .collect();
            Bytes::copy_from_slice(bytemuck::cast_slice(&depth))
        }
        ChannelKind::Segmentation => {
            let mut buf = Vec::with_capacity(pixels * 3);
            for y in 0..height {
                let label: [u8; 3] = if y < height / 2 {
                    [200, 120, 40]
                } else {
                    [40, 160, 80]
                };
                for _ in 0..width {
                    buf.extend_from_slice(&label);
                }
            }
            Bytes::from(buf)
        }
        ChannelKind::OpticalFlow => Bytes::from(vec![128u8; pixels * 3]),
    };

    debug_assert_eq!(layout.buffer_len(width, height), data.len());
    RawImage {
        width,
        height,
        layout,
        data,
    }
}
