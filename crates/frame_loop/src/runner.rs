//! FrameLoop 核心实现
//!
//! 状态机：Idle → Ready → Ticking → Terminated(reason)。
//! 帧计数器只在渲染并收集成功后提交，失败重试复用同一 FrameId。

use std::time::Duration;

use contracts::{
    CaptureStamp, ContractError, EngineSession, FrameId, LoopConfig, RenderOutputSet, SceneId,
    VehicleState,
};
use engine_bridge::{BridgeError, EngineBridge, EntityHandle};
use publisher::{OutputPublisher, PublishReport};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{LoopError, Result};
use crate::motion::{HoldState, MotionPolicy};
use crate::retry::RetryPolicy;
use crate::stats::LoopStats;

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// `should_continue` returned false, or the loop was finished by its owner
    Stopped,
    /// `max_frames` frames were published
    MaxFrames,
    /// The engine never became ready
    ConnectionFailed,
    /// A frame kept failing after all retries
    RenderFailed,
    /// The engine session was lost
    SessionLost,
    /// The bridge refused a frame operation
    EngineError,
    /// The motion policy produced an unusable pose
    InvalidMotion,
}

/// Frame loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Ready,
    Ticking,
    Terminated(TerminationReason),
}

impl LoopState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, LoopState::Terminated(_))
    }
}

/// Frame loop settings
#[derive(Debug, Clone, Default)]
pub struct LoopSettings {
    /// Stop after this many frames (None = unlimited)
    pub max_frames: Option<u64>,
    /// Pace ticks at this rate (None = as fast as the engine renders)
    pub tick_rate_hz: Option<f64>,
    pub retry: RetryPolicy,
}

impl LoopSettings {
    /// Minimum duration of one tick
    pub fn tick_period(&self) -> Option<Duration> {
        self.tick_rate_hz
            .filter(|hz| hz.is_finite() && *hz > 0.0)
            .map(|hz| Duration::from_secs_f64(1.0 / hz))
    }
}

impl From<&LoopConfig> for LoopSettings {
    fn from(config: &LoopConfig) -> Self {
        Self {
            max_frames: config.max_frames,
            tick_rate_hz: config.tick_rate_hz,
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

/// Result of one successful tick
#[derive(Debug)]
pub struct TickReport {
    pub frame_id: FrameId,
    /// Render attempts, 1 when no retry was needed
    pub attempts: u32,
    /// Time from the successful `request_frame` to collected outputs
    pub render_latency: Duration,
    pub publish: PublishReport,
}

/// Frame loop
///
/// 独占 EngineBridge 和 OutputPublisher；车辆状态只经由运动策略改变。
pub struct FrameLoop<S: EngineSession> {
    bridge: EngineBridge<S>,
    vehicle: EntityHandle,
    publisher: OutputPublisher,
    motion: Box<dyn MotionPolicy>,
    settings: LoopSettings,
    state: LoopState,
    next_frame: FrameId,
    vehicle_state: VehicleState,
    started_at: Option<Instant>,
    stats: LoopStats,
}

impl<S: EngineSession> FrameLoop<S> {
    /// Create a loop driving `vehicle`, which must be registered with `bridge`.
    ///
    /// The vehicle holds its registered state until a motion policy is set.
    pub fn new(
        bridge: EngineBridge<S>,
        vehicle: EntityHandle,
        publisher: OutputPublisher,
    ) -> Result<Self> {
        let vehicle_state = bridge
            .vehicle(&vehicle)
            .map(|proxy| *proxy.state())
            .ok_or_else(|| BridgeError::UnknownEntity {
                entity_id: vehicle.id().to_string(),
            })?;

        Ok(Self {
            bridge,
            vehicle,
            publisher,
            motion: Box::new(HoldState),
            settings: LoopSettings::default(),
            state: LoopState::Idle,
            next_frame: 0,
            vehicle_state,
            started_at: None,
            stats: LoopStats::default(),
        })
    }

    pub fn with_motion(self, motion: impl MotionPolicy + 'static) -> Self {
        self.with_boxed_motion(Box::new(motion))
    }

    pub fn with_boxed_motion(mut self, motion: Box<dyn MotionPolicy>) -> Self {
        self.motion = motion;
        self
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.settings.retry = retry;
        self
    }

    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.settings.max_frames = max_frames;
        self
    }

    pub fn with_tick_rate(mut self, tick_rate_hz: Option<f64>) -> Self {
        self.settings.tick_rate_hz = tick_rate_hz;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Id the next tick renders
    pub fn next_frame_id(&self) -> FrameId {
        self.next_frame
    }

    /// State pushed with the last frame
    pub fn vehicle_state(&self) -> &VehicleState {
        &self.vehicle_state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn bridge(&self) -> &EngineBridge<S> {
        &self.bridge
    }

    pub fn publisher(&self) -> &OutputPublisher {
        &self.publisher
    }

    /// Connect the engine and open `scene`.
    ///
    /// # Errors
    /// `ConnectionFailed` if the engine did not become ready. The loop is
    /// then Terminated and will never tick.
    #[instrument(name = "frame_loop_start", skip(self), fields(scene = %scene))]
    pub async fn start(&mut self, scene: SceneId) -> Result<()> {
        if self.state != LoopState::Idle {
            return Err(LoopError::invalid_state(self.state, "start"));
        }
        self.started_at = Some(Instant::now());

        let ready = match self.bridge.connect(scene).await {
            Ok(ready) => ready,
            Err(e) => {
                self.terminate(TerminationReason::ConnectionFailed);
                return Err(e.into());
            }
        };
        observability::record_connect(ready);

        if !ready {
            error!(%scene, "Engine did not become ready, no frame will be rendered");
            self.terminate(TerminationReason::ConnectionFailed);
            return Err(LoopError::ConnectionFailed { scene });
        }

        self.state = LoopState::Ready;
        info!(
            %scene,
            vehicles = self.bridge.vehicle_count(),
            static_structures = self.bridge.static_structure_count(),
            "Frame loop ready"
        );
        Ok(())
    }

    /// Render and publish one frame.
    ///
    /// On error the counter does not advance and the loop is Terminated.
    #[instrument(name = "frame_loop_tick", skip(self), fields(frame_id = self.next_frame))]
    pub async fn tick(&mut self) -> Result<TickReport> {
        if !matches!(self.state, LoopState::Ready | LoopState::Ticking) {
            return Err(LoopError::invalid_state(self.state, "tick"));
        }
        let frame_id = self.next_frame;
        self.stats.ticks += 1;

        // 1-2. motion policy -> proxy
        let next_state = self.motion.next_state(frame_id, &self.vehicle_state);
        if let Err(source) = self.bridge.set_state(&self.vehicle, &next_state) {
            error!(frame_id, error = %source, "Motion policy produced an invalid state");
            self.terminate(TerminationReason::InvalidMotion);
            return Err(LoopError::InvalidMotion { frame_id, source });
        }
        if let Some(proxy) = self.bridge.vehicle(&self.vehicle) {
            self.vehicle_state = *proxy.state();
        }

        // 3-4. request + collect, retrying the same frame id
        let (outputs, render_latency, attempts) = self.render_with_retry(frame_id).await?;

        // 5. commit
        self.next_frame = frame_id + 1;

        // 6. one stamp for every channel of this frame
        let stamp = CaptureStamp::now();
        let latency_ms = render_latency.as_secs_f64() * 1000.0;
        observability::record_frame_rendered(frame_id, latency_ms, outputs.channel_count());
        self.stats.metrics.record_frame(frame_id, latency_ms);

        let publish = self.publisher.publish(outputs, stamp);
        self.record_publish(frame_id, &publish);
        self.state = LoopState::Ticking;

        debug!(
            frame_id,
            stamp = %stamp,
            delivered = publish.delivered.len(),
            failures = publish.failures.len(),
            z = self.vehicle_state.pose.position.z,
            "Frame published"
        );

        Ok(TickReport {
            frame_id,
            attempts,
            render_latency,
            publish,
        })
    }

    /// Start the loop on `scene` and tick until a stop condition.
    ///
    /// Stops when `should_continue(next_frame_id)` returns false, when
    /// `max_frames` frames were published, or on the first unrecoverable
    /// error. Returns the statistics of the run; they stay available through
    /// [`FrameLoop::stats`] when an error is returned.
    #[instrument(name = "frame_loop_run", skip(self, should_continue), fields(scene = %scene))]
    pub async fn run<F>(&mut self, scene: SceneId, mut should_continue: F) -> Result<LoopStats>
    where
        F: FnMut(FrameId) -> bool,
    {
        self.start(scene).await?;

        let period = self.settings.tick_period();
        info!(
            max_frames = ?self.settings.max_frames,
            tick_rate_hz = ?self.settings.tick_rate_hz,
            max_retries = self.settings.retry.max_retries,
            "Frame loop running"
        );

        loop {
            if let Some(max) = self.settings.max_frames {
                if self.next_frame >= max {
                    info!(frames = self.next_frame, "Reached max frames limit");
                    self.terminate(TerminationReason::MaxFrames);
                    break;
                }
            }
            if !should_continue(self.next_frame) {
                info!(frames = self.next_frame, "Frame loop stopped by caller");
                self.terminate(TerminationReason::Stopped);
                break;
            }

            let tick_started = Instant::now();
            self.tick().await?;

            if let Some(period) = period {
                sleep_until(tick_started + period).await;
            }
            let tick_ms = tick_started.elapsed().as_secs_f64() * 1000.0;
            observability::record_tick_duration_ms(tick_ms);
            self.stats.metrics.record_tick(tick_ms);
        }

        Ok(self.stats.clone())
    }

    /// Close the engine session and drain every stream.
    ///
    /// Streams still busy after `drain_timeout` are abandoned.
    #[instrument(name = "frame_loop_finish", skip(self))]
    pub async fn finish(mut self, drain_timeout: Option<Duration>) -> LoopStats {
        if !self.state.is_terminated() {
            self.terminate(TerminationReason::Stopped);
        }
        if let Err(e) = self.bridge.close().await {
            warn!(error = %e, "Engine session did not close cleanly");
        }

        self.stats.streams = self.publisher.shutdown(drain_timeout).await;
        info!(
            frames = self.stats.frames_published,
            termination = ?self.stats.termination,
            "Frame loop finished"
        );
        self.stats
    }

    async fn render_with_retry(
        &mut self,
        frame_id: FrameId,
    ) -> Result<(RenderOutputSet, Duration, u32)> {
        let mut retries = 0u32;
        loop {
            let started = Instant::now();
            let error = match self.render(frame_id).await {
                Ok(outputs) => return Ok((outputs, started.elapsed(), retries + 1)),
                Err(e) => e,
            };
            self.stats.metrics.record_failure();

            if error.is_fatal() {
                observability::record_render_failure(true);
                error!(frame_id, error = %error, "Engine session lost");
                self.terminate(TerminationReason::SessionLost);
                return Err(LoopError::SessionLost {
                    frame_id,
                    source: error,
                });
            }
            if !matches!(error, BridgeError::RenderFailed { .. }) {
                observability::record_render_failure(true);
                error!(frame_id, error = %error, "Engine bridge refused frame");
                self.bridge.mark_failed();
                self.terminate(TerminationReason::EngineError);
                return Err(LoopError::Bridge(error));
            }
            if !self.settings.retry.should_retry(retries) {
                observability::record_render_failure(true);
                error!(
                    frame_id,
                    attempts = retries + 1,
                    error = %error,
                    "Render failed, giving up"
                );
                self.bridge.mark_failed();
                self.terminate(TerminationReason::RenderFailed);
                return Err(LoopError::RenderFailed {
                    frame_id,
                    attempts: retries + 1,
                    source: error,
                });
            }

            observability::record_render_failure(false);
            observability::record_render_retry();
            let delay = self.settings.retry.backoff(retries);
            retries += 1;
            self.stats.retries += 1;
            self.stats.metrics.record_retry();
            warn!(
                frame_id,
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Render failed, retrying same frame"
            );
            sleep(delay).await;
        }
    }

    async fn render(&mut self, frame_id: FrameId) -> std::result::Result<RenderOutputSet, BridgeError> {
        self.bridge.request_frame(frame_id).await?;
        self.bridge.collect_outputs().await
    }

    fn record_publish(&mut self, frame_id: FrameId, report: &PublishReport) {
        self.stats.frames_published += 1;
        self.stats.last_frame_id = Some(frame_id);
        self.stats.channels_published += report.delivered.len() as u64;
        self.stats.channels_unrouted += report.unrouted as u64;
        self.stats.delivery_failures += report.failures.len() as u64;

        for stream in &report.delivered {
            self.stats.metrics.record_delivery(stream, true);
        }
        for failure in &report.failures {
            if let ContractError::StreamDeliveryFailed { stream, .. } = failure {
                self.stats.metrics.record_delivery(stream, false);
            }
        }
    }

    fn terminate(&mut self, reason: TerminationReason) {
        self.state = LoopState::Terminated(reason);
        self.stats.termination = Some(reason);
        if let Some(started) = self.started_at {
            self.stats.duration = started.elapsed();
        }
        debug!(?reason, next_frame = self.next_frame, "Frame loop terminated");
    }
}
