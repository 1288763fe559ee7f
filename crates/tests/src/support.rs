//! Shared fixtures: a recording stream and a mock-engine frame loop builder

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::{
    ChannelKind, ChannelMask, ContractError, OutputStream, Pose, StampedImage, Vector3,
};
use engine_bridge::{EngineBridge, EngineCallLog, MockEngine, MockEngineConfig};
use entities::{EntityProxy, SensorDescriptor};
use frame_loop::FrameLoop;
use publisher::OutputPublisher;

pub const CAMERA: &str = "rgb_camera";

/// Images a [`RecordingStream`] received, shared with the test
#[derive(Clone, Default)]
pub struct Recording(Arc<Mutex<Vec<StampedImage>>>);

impl Recording {
    pub fn images(&self) -> Vec<StampedImage> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn frame_ids(&self) -> Vec<u64> {
        self.images().iter().map(|image| image.frame_id).collect()
    }
}

/// Stream that keeps every delivered image, or fails every delivery
pub struct RecordingStream {
    name: String,
    recording: Recording,
    fail: bool,
}

impl RecordingStream {
    pub fn new(name: &str) -> (Self, Recording) {
        let recording = Recording::default();
        let stream = Self {
            name: name.to_string(),
            recording: recording.clone(),
            fail: false,
        };
        (stream, recording)
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            recording: Recording::default(),
            fail: true,
        }
    }
}

impl OutputStream for RecordingStream {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&mut self, image: &StampedImage) -> Result<(), ContractError> {
        if self.fail {
            return Err(ContractError::stream_delivery(
                &self.name,
                image.frame_id,
                "downstream unavailable",
            ));
        }
        self.recording
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(image.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

/// Quadrotor with one 8x4 camera rendering `mask`
pub fn quad(mask: ChannelMask) -> EntityProxy {
    let mut proxy = EntityProxy::vehicle("quad", Vector3::new(0.5, 0.5, 0.5));
    let mut camera = SensorDescriptor::new(CAMERA);
    camera
        .configure(Pose::from_position(0.0, -2.0, 0.0), 90.0, 8, 4, mask)
        .unwrap();
    proxy.attach_sensor(camera).unwrap();
    proxy
}

/// Frame loop over a mock engine with a recording stream on every channel.
///
/// Recordings are returned in `ChannelKind::ALL` order.
pub fn recorded_loop(
    config: MockEngineConfig,
    mask: ChannelMask,
) -> (FrameLoop<MockEngine>, Vec<Recording>, EngineCallLog) {
    recorded_loop_with_timeout(config, mask, Duration::from_secs(5))
}

pub fn recorded_loop_with_timeout(
    config: MockEngineConfig,
    mask: ChannelMask,
    render_timeout: Duration,
) -> (FrameLoop<MockEngine>, Vec<Recording>, EngineCallLog) {
    let engine = MockEngine::with_config(config);
    let log = engine.call_log();

    let mut bridge = EngineBridge::new(engine).with_render_timeout(render_timeout);
    let handle = bridge.add_vehicle(quad(mask)).unwrap();

    let mut publisher = OutputPublisher::new();
    let recordings = ChannelKind::ALL
        .into_iter()
        .map(|channel| {
            let (stream, recording) = RecordingStream::new(channel.default_stream_name());
            publisher.add_stream(CAMERA, channel, stream, 64).unwrap();
            recording
        })
        .collect();

    let frame_loop = FrameLoop::new(bridge, handle, publisher).unwrap();
    (frame_loop, recordings, log)
}
