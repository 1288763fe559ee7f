//! EngineBridge 核心实现
//!
//! 注册实体、建立场景连接、逐帧请求渲染并收集输出。

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use contracts::{
    ChannelMask, ConnectionState, ContractError, EngineSession, EntityId, EntityPose, FrameId,
    FrameRequest, Pose, RenderOutputSet, SceneId, SessionManifest, VehicleState,
};
use entities::{EntityProxy, StaticStructure};
use tracing::{debug, info, instrument, warn};

use crate::error::{BridgeError, Result};

/// Non-owning reference to a registered vehicle
///
/// Resolved by the bridge on every use; a handle from another bridge does
/// not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    id: EntityId,
    index: usize,
}

impl EntityHandle {
    pub fn id(&self) -> &EntityId {
        &self.id
    }
}

/// Engine Bridge
///
/// 持有与渲染引擎的唯一会话。状态只向前迁移：
/// Disconnected → Connecting → {Ready, Failed}，Ready → Failed。
pub struct EngineBridge<S: EngineSession> {
    session: S,
    state: ConnectionState,
    scene: Option<SceneId>,
    vehicles: Vec<EntityProxy>,
    statics: Vec<StaticStructure>,
    registered: HashSet<EntityId>,
    /// camera id -> enabled channels
    masks: HashMap<EntityId, ChannelMask>,
    outstanding: Option<FrameId>,
    connect_timeout: Option<Duration>,
    render_timeout: Option<Duration>,
    closed: bool,
}

impl<S: EngineSession> EngineBridge<S> {
    /// 创建新的 EngineBridge（无超时限制）
    pub fn new(session: S) -> Self {
        Self {
            session,
            state: ConnectionState::Disconnected,
            scene: None,
            vehicles: Vec::new(),
            statics: Vec::new(),
            registered: HashSet::new(),
            masks: HashMap::new(),
            outstanding: None,
            connect_timeout: None,
            render_timeout: None,
            closed: false,
        }
    }

    /// Bound `connect`. A zero duration means unbounded.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Bound each `request_frame` / `collect_outputs` call. A zero duration
    /// means unbounded.
    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready && !self.closed
    }

    /// Frame requested but not yet collected
    pub fn outstanding_frame(&self) -> Option<FrameId> {
        self.outstanding
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn static_structure_count(&self) -> usize {
        self.statics.len()
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// 注册车辆
    ///
    /// The proxy is sealed: its size and camera configuration are fixed from
    /// here on. Only the pose can change, through the returned handle.
    ///
    /// # Errors
    /// - `AlreadyConnected` once `connect` was called
    /// - `DuplicateEntity` if the vehicle or camera id is taken
    /// - `Entity(SensorNotConfigured)` if the attached camera was never configured
    pub fn add_vehicle(&mut self, mut proxy: EntityProxy) -> Result<EntityHandle> {
        self.ensure_registration_open(proxy.id())?;
        self.ensure_unique(proxy.id())?;
        if let Some(sensor) = proxy.sensor() {
            if sensor.id() == proxy.id() {
                return Err(BridgeError::DuplicateEntity {
                    entity_id: sensor.id().to_string(),
                });
            }
            self.ensure_unique(sensor.id())?;
        }

        proxy.seal()?;

        let id = proxy.id().clone();
        self.registered.insert(id.clone());
        if let Some(sensor) = proxy.sensor() {
            self.registered.insert(sensor.id().clone());
            self.masks.insert(sensor.id().clone(), sensor.channels());
        }

        let handle = EntityHandle {
            id,
            index: self.vehicles.len(),
        };
        debug!(entity_id = %handle.id, "vehicle registered");
        self.vehicles.push(proxy);
        Ok(handle)
    }

    /// 注册静态结构（门框、障碍物）
    pub fn add_static_structure(&mut self, mut structure: StaticStructure) -> Result<()> {
        self.ensure_registration_open(structure.id())?;
        self.ensure_unique(structure.id())?;
        structure.seal()?;

        debug!(
            entity_id = %structure.id(),
            prefab_id = structure.prefab_id(),
            "static structure registered"
        );
        self.registered.insert(structure.id().clone());
        self.statics.push(structure);
        Ok(())
    }

    /// Everything that will be (or was) sent to the engine on connect
    pub fn manifest(&self) -> SessionManifest {
        SessionManifest {
            vehicles: self.vehicles.iter().map(EntityProxy::descriptor).collect(),
            static_structures: self
                .statics
                .iter()
                .map(StaticStructure::descriptor)
                .collect(),
        }
    }

    /// 连接引擎并加载场景
    ///
    /// Returns `Ok(true)` when the engine is ready with every entity
    /// instantiated. Refusal, transport errors and timeouts are logged and
    /// reported as `Ok(false)`; the bridge is then Failed.
    ///
    /// # Errors
    /// `AlreadyConnected` if called more than once.
    #[instrument(
        name = "engine_bridge_connect",
        skip(self),
        fields(scene = %scene, vehicles = self.vehicles.len(), statics = self.statics.len())
    )]
    pub async fn connect(&mut self, scene: SceneId) -> Result<bool> {
        if self.state != ConnectionState::Disconnected {
            return Err(BridgeError::AlreadyConnected {
                operation: "connect twice".into(),
            });
        }

        self.transition(ConnectionState::Connecting);
        self.scene = Some(scene);
        let manifest = self.manifest();

        let outcome = bounded(self.connect_timeout, self.session.connect(scene, &manifest)).await;

        let ready = match outcome {
            Some(Ok(true)) => true,
            Some(Ok(false)) => {
                warn!("engine refused the session");
                false
            }
            Some(Err(e)) => {
                warn!(error = %e, "engine connection failed");
                false
            }
            None => {
                warn!(
                    timeout_ms = self.connect_timeout.map(|t| t.as_millis() as u64),
                    "engine connection timed out"
                );
                false
            }
        };

        if ready {
            self.transition(ConnectionState::Ready);
            info!(cameras = manifest.camera_count(), "engine ready");
        } else {
            self.transition(ConnectionState::Failed);
        }
        Ok(ready)
    }

    /// Overwrite a vehicle pose; pushed to the engine with the next frame.
    pub fn set_pose(&mut self, handle: &EntityHandle, pose: Pose) -> Result<()> {
        self.vehicle_mut(handle)?.set_pose(pose)?;
        Ok(())
    }

    pub fn set_state(&mut self, handle: &EntityHandle, state: &VehicleState) -> Result<()> {
        self.vehicle_mut(handle)?.set_state(state)?;
        Ok(())
    }

    pub fn vehicle(&self, handle: &EntityHandle) -> Option<&EntityProxy> {
        self.vehicles
            .get(handle.index)
            .filter(|proxy| proxy.id() == &handle.id)
    }

    /// 请求渲染一帧
    ///
    /// Sends every vehicle pose tagged with `frame_id` and waits until the
    /// engine reports completion.
    ///
    /// # Errors
    /// - `NotReady` unless connected
    /// - `FrameOutstanding` if the previous frame was not collected
    /// - `RenderFailed` on engine failure or timeout; the bridge stays Ready
    /// - `SessionLost` on an irrecoverable engine error; the bridge is Failed
    #[instrument(name = "engine_bridge_request_frame", skip(self))]
    pub async fn request_frame(&mut self, frame_id: FrameId) -> Result<()> {
        self.ensure_ready()?;
        if let Some(outstanding) = self.outstanding {
            return Err(BridgeError::FrameOutstanding {
                outstanding,
                requested: frame_id,
            });
        }

        let request = FrameRequest {
            frame_id,
            vehicles: self
                .vehicles
                .iter()
                .map(|proxy| EntityPose {
                    id: proxy.id().clone(),
                    pose: proxy.pose(),
                })
                .collect(),
        };

        let outcome = bounded(self.render_timeout, self.session.request_frame(&request)).await;
        match outcome {
            Some(Ok(())) => {
                self.outstanding = Some(frame_id);
                Ok(())
            }
            Some(Err(e)) => Err(self.classify(frame_id, e)),
            None => Err(self.timed_out(frame_id)),
        }
    }

    /// 收集当前帧的渲染输出
    ///
    /// Clears the outstanding marker whatever the outcome, so a failed
    /// collect can be retried with a fresh `request_frame` for the same id.
    #[instrument(name = "engine_bridge_collect_outputs", skip(self), fields(frame_id))]
    pub async fn collect_outputs(&mut self) -> Result<RenderOutputSet> {
        let frame_id = self.outstanding.ok_or(BridgeError::NoOutstandingFrame)?;
        tracing::Span::current().record("frame_id", frame_id);
        self.ensure_ready()?;
        self.outstanding = None;

        let outcome = bounded(self.render_timeout, self.session.collect_outputs()).await;
        let mut outputs = match outcome {
            Some(Ok(outputs)) => outputs,
            Some(Err(e)) => return Err(self.classify(frame_id, e)),
            None => return Err(self.timed_out(frame_id)),
        };

        if outputs.frame_id != frame_id {
            return Err(BridgeError::render_failed(
                frame_id,
                format!("engine returned outputs of frame {}", outputs.frame_id),
            ));
        }

        outputs.sensors.retain_mut(|sensor| match self.masks.get(&sensor.sensor_id) {
            Some(mask) => {
                sensor.retain_enabled(mask);
                true
            }
            None => {
                debug!(sensor_id = %sensor.sensor_id, "dropping outputs of unregistered sensor");
                false
            }
        });

        Ok(outputs)
    }

    /// Ready → Failed. Used when the caller gives up on the session.
    pub fn mark_failed(&mut self) {
        if self.state.can_transition_to(ConnectionState::Failed) {
            self.transition(ConnectionState::Failed);
        }
    }

    /// 释放会话
    ///
    /// 幂等：多次调用安全。
    #[instrument(name = "engine_bridge_close", skip(self))]
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.outstanding = None;
        if self.state == ConnectionState::Disconnected {
            return Ok(());
        }
        self.session
            .disconnect()
            .await
            .map_err(|e| BridgeError::SessionLost {
                message: e.to_string(),
            })?;
        info!("engine session closed");
        Ok(())
    }

    fn vehicle_mut(&mut self, handle: &EntityHandle) -> Result<&mut EntityProxy> {
        self.vehicles
            .get_mut(handle.index)
            .filter(|proxy| proxy.id() == &handle.id)
            .ok_or_else(|| BridgeError::UnknownEntity {
                entity_id: handle.id.to_string(),
            })
    }

    fn ensure_registration_open(&self, id: &EntityId) -> Result<()> {
        if self.state == ConnectionState::Disconnected {
            Ok(())
        } else {
            Err(BridgeError::AlreadyConnected {
                operation: format!("register '{id}'"),
            })
        }
    }

    fn ensure_unique(&self, id: &EntityId) -> Result<()> {
        if self.registered.contains(id) {
            Err(BridgeError::DuplicateEntity {
                entity_id: id.to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(BridgeError::NotReady { state: self.state })
        }
    }

    fn classify(&mut self, frame_id: FrameId, error: ContractError) -> BridgeError {
        if error.is_session_fatal() {
            warn!(frame_id, error = %error, "engine session lost");
            self.transition(ConnectionState::Failed);
            self.outstanding = None;
            BridgeError::SessionLost {
                message: error.to_string(),
            }
        } else {
            warn!(frame_id, error = %error, "render failed");
            BridgeError::render_failed(frame_id, error.to_string())
        }
    }

    fn timed_out(&mut self, frame_id: FrameId) -> BridgeError {
        let timeout_ms = self
            .render_timeout
            .map(|t| t.as_millis() as u64)
            .unwrap_or_default();
        warn!(frame_id, timeout_ms, "render timed out");
        BridgeError::render_failed(frame_id, format!("no answer within {timeout_ms} ms"))
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "connection state");
        self.state = next;
    }
}

/// Await `fut`, giving up after `limit`. `None` means the limit expired.
async fn bounded<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}
