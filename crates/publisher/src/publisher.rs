//! OutputPublisher - routes each sensor channel of a frame to its stream

use std::collections::HashMap;
use std::time::Duration;

use contracts::{
    CaptureStamp, ChannelKind, ContractError, EntityId, FrameId, OutputStream, RenderOutputSet,
    StampedImage, StreamConfig, StreamType,
};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::error::PublisherError;
use crate::handle::StreamHandle;
use crate::metrics::StreamMetricsSnapshot;
use crate::package::package_channel;
use crate::streams::{BroadcastStream, FileStream, LogStream, NetworkStream};

/// Outcome of publishing one frame
#[derive(Debug, Default)]
pub struct PublishReport {
    pub frame_id: FrameId,
    /// Timestamp shared by every image of the frame
    pub stamp: Option<CaptureStamp>,
    /// Streams that accepted an image, in publish order
    pub delivered: Vec<String>,
    /// Channels present in the frame without a route
    pub unrouted: usize,
    /// `StreamDeliveryFailed` for every image that was not queued
    pub failures: Vec<ContractError>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

type RouteKey = (EntityId, ChannelKind);

/// Output publisher
///
/// 每个 (sensor, channel) 对应一个流；每个流有独立的队列和 worker，
/// 慢流或失败流不会阻塞渲染循环。
#[derive(Default)]
pub struct OutputPublisher {
    handles: Vec<StreamHandle>,
    routes: HashMap<RouteKey, usize>,
    broadcasters: HashMap<String, broadcast::Sender<StampedImage>>,
}

impl OutputPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `channel` of `sensor_id` to `stream`.
    pub fn add_stream<S: OutputStream + 'static>(
        &mut self,
        sensor_id: impl Into<EntityId>,
        channel: ChannelKind,
        stream: S,
        queue_capacity: usize,
    ) -> Result<(), PublisherError> {
        let key = (sensor_id.into(), channel);
        if let Some(existing) = self.routes.get(&key) {
            return Err(PublisherError::DuplicateRoute {
                sensor_id: key.0.to_string(),
                channel,
                existing: self.handles[*existing].name().to_string(),
            });
        }

        let handle = StreamHandle::spawn(stream, queue_capacity);
        debug!(
            stream = handle.name(),
            sensor_id = %key.0,
            channel = %channel,
            "stream routed"
        );
        self.routes.insert(key, self.handles.len());
        self.handles.push(handle);
        Ok(())
    }

    /// Route `channel` of `sensor_id` to an in-process broadcast stream and
    /// return a first subscriber.
    pub fn add_broadcast(
        &mut self,
        sensor_id: impl Into<EntityId>,
        channel: ChannelKind,
        name: impl Into<String>,
        queue_capacity: usize,
    ) -> Result<broadcast::Receiver<StampedImage>, PublisherError> {
        let stream = BroadcastStream::new(name, queue_capacity);
        let sender = stream.sender();
        let receiver = sender.subscribe();
        let name = stream.name().to_string();
        self.add_stream(sensor_id, channel, stream, queue_capacity)?;
        self.broadcasters.insert(name, sender);
        Ok(receiver)
    }

    /// New subscriber of a broadcast stream
    pub fn subscribe(&self, stream: &str) -> Option<broadcast::Receiver<StampedImage>> {
        self.broadcasters.get(stream).map(broadcast::Sender::subscribe)
    }

    pub fn stream_count(&self) -> usize {
        self.handles.len()
    }

    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.handles.iter().map(StreamHandle::name)
    }

    /// Name of the stream serving a channel, if routed
    pub fn route(&self, sensor_id: &str, channel: ChannelKind) -> Option<&str> {
        self.routes
            .get(&(EntityId::from(sensor_id), channel))
            .map(|index| self.handles[*index].name())
    }

    /// Publish every channel of `outputs` with the single timestamp `stamp`.
    ///
    /// Never fails: malformed buffers and refused deliveries are logged,
    /// counted and listed in the report. Write errors inside a stream worker
    /// happen after this returns and only show up in the stream metrics.
    #[instrument(
        name = "output_publisher_publish",
        skip(self, outputs),
        fields(frame_id = outputs.frame_id, channels = outputs.channel_count())
    )]
    pub fn publish(&self, outputs: RenderOutputSet, stamp: CaptureStamp) -> PublishReport {
        let frame_id = outputs.frame_id;
        let mut report = PublishReport {
            frame_id,
            stamp: Some(stamp),
            ..Default::default()
        };

        for sensor in outputs.sensors {
            for (channel, image) in sensor.channels {
                let key = (sensor.sensor_id.clone(), channel);
                let Some(handle) = self.routes.get(&key).map(|i| &self.handles[*i]) else {
                    debug!(sensor_id = %sensor.sensor_id, channel = %channel, "no route, skipped");
                    report.unrouted += 1;
                    continue;
                };

                let message = match package_channel(
                    handle.name(),
                    &sensor.sensor_id,
                    channel,
                    image,
                    frame_id,
                    stamp,
                ) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(stream = handle.name(), error = %e, "malformed buffer");
                        handle.metrics().inc_failure_count();
                        observability::record_stream_delivery(handle.name(), "malformed");
                        report.failures.push(e);
                        continue;
                    }
                };

                match handle.try_send(message) {
                    Ok(()) => report.delivered.push(handle.name().to_string()),
                    Err(refused) => {
                        observability::record_stream_delivery(handle.name(), refused.as_status());
                        report.failures.push(ContractError::stream_delivery(
                            handle.name(),
                            frame_id,
                            format!("{:?}", refused),
                        ));
                    }
                }
            }
        }

        report
    }

    /// Get metrics for all streams
    pub fn metrics(&self) -> Vec<(String, StreamMetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Close every stream, waiting up to `drain_timeout` per stream.
    ///
    /// Returns the final metrics of every stream.
    #[instrument(name = "output_publisher_shutdown", skip(self), fields(streams = self.handles.len()))]
    pub async fn shutdown(self, drain_timeout: Option<Duration>) -> Vec<(String, StreamMetricsSnapshot)> {
        let mut finals = Vec::with_capacity(self.handles.len());
        let mut pending = Vec::with_capacity(self.handles.len());

        // 所有流并行关闭，一个流超时不影响其它流
        for handle in self.handles {
            let name = handle.name().to_string();
            let metrics = std::sync::Arc::clone(handle.metrics());
            pending.push(tokio::spawn(async move {
                let drained = handle.shutdown(drain_timeout).await;
                (name, metrics, drained)
            }));
        }

        for task in pending {
            match task.await {
                Ok((name, metrics, drained)) => {
                    if !drained {
                        warn!(stream = %name, "stream abandoned during shutdown");
                    }
                    finals.push((name, metrics.snapshot()));
                }
                Err(e) => warn!(error = %e, "stream shutdown task failed"),
            }
        }

        info!("Publisher shutdown complete");
        finals
    }
}

/// Create a StreamHandle from configuration
#[instrument(
    name = "publisher_create_stream",
    skip(publisher, config),
    fields(stream = %config.name, stream_type = ?config.stream_type)
)]
async fn add_configured_stream(
    publisher: &mut OutputPublisher,
    config: &StreamConfig,
) -> Result<(), PublisherError> {
    let sensor_id = config.sensor_id.as_str();
    match config.stream_type {
        StreamType::Log => publisher.add_stream(
            sensor_id,
            config.channel,
            LogStream::new(&config.name),
            config.queue_capacity,
        ),
        StreamType::File => {
            let stream = FileStream::from_params(&config.name, &config.params)
                .map_err(|e| PublisherError::stream_creation(&config.name, e.to_string()))?;
            publisher.add_stream(sensor_id, config.channel, stream, config.queue_capacity)
        }
        StreamType::Network => {
            let stream = NetworkStream::from_params(&config.name, &config.params)
                .await
                .map_err(|e| PublisherError::stream_creation(&config.name, e.to_string()))?;
            publisher.add_stream(sensor_id, config.channel, stream, config.queue_capacity)
        }
        StreamType::Broadcast => publisher
            .add_broadcast(sensor_id, config.channel, &config.name, config.queue_capacity)
            .map(drop),
    }
}

/// Convenience function to create a publisher from stream configs
#[instrument(name = "publisher_create", skip(configs), fields(streams = configs.len()))]
pub async fn create_publisher(configs: &[StreamConfig]) -> Result<OutputPublisher, PublisherError> {
    let mut publisher = OutputPublisher::new();
    for config in configs {
        add_configured_stream(&mut publisher, config).await?;
    }
    Ok(publisher)
}
