//! NetworkStream - UDP fire-and-forget image streaming

use bytes::Bytes;
use contracts::{
    CaptureStamp, ChannelKind, ContractError, EntityId, FrameId, ImageEncoding, OutputStream,
    StampedImage,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkStream
#[derive(Debug, Clone)]
pub struct NetworkStreamConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: NetworkFormat,
    /// Max datagram size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
    /// Send pixel data; `false` sends headers only
    pub include_data: bool,
}

impl NetworkStreamConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(65000);

        let include_data = params
            .get("include_data")
            .map(|v| matches!(v.as_str(), "true" | "1" | "yes"))
            .unwrap_or(true);

        Ok(Self {
            addr,
            format,
            max_packet_size,
            include_data,
        })
    }
}

/// One datagram on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePacket {
    pub stream: String,
    pub sensor_id: EntityId,
    pub channel: ChannelKind,
    pub frame_id: FrameId,
    pub stamp: CaptureStamp,
    pub encoding: ImageEncoding,
    pub width: u32,
    pub height: u32,
    pub step: u32,
    pub data: Option<Bytes>,
}

impl ImagePacket {
    fn from_image(image: &StampedImage, include_data: bool) -> Self {
        Self {
            stream: image.stream.clone(),
            sensor_id: image.sensor_id.clone(),
            channel: image.channel,
            frame_id: image.frame_id,
            stamp: image.stamp,
            encoding: image.encoding,
            width: image.width,
            height: image.height,
            step: image.step,
            data: include_data.then(|| image.data.clone()),
        }
    }
}

/// Stream that sends images over UDP
pub struct NetworkStream {
    name: String,
    config: NetworkStreamConfig,
    socket: Option<UdpSocket>,
}

impl NetworkStream {
    /// Create a new NetworkStream
    #[instrument(name = "network_stream_new", skip(name, config))]
    pub async fn new(
        name: impl Into<String>,
        config: NetworkStreamConfig,
    ) -> std::io::Result<Self> {
        let name = name.into();
        // Bind to any available port
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&config.addr).await?;

        debug!(stream = %name, target = %config.addr, "NetworkStream connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "network_stream_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let config =
            NetworkStreamConfig::from_params(params).map_err(ContractError::Other)?;

        Self::new(name, config)
            .await
            .map_err(|e| ContractError::Other(format!("udp socket: {e}")))
    }

    fn encode(&self, image: &StampedImage) -> Result<Vec<u8>, ContractError> {
        let packet = ImagePacket::from_image(image, self.config.include_data);
        let data = match self.config.format {
            NetworkFormat::Json => serde_json::to_vec(&packet).map_err(|e| e.to_string()),
            NetworkFormat::Bincode => bincode::serialize(&packet).map_err(|e| e.to_string()),
        }
        .map_err(|e| ContractError::stream_delivery(&self.name, image.frame_id, e))?;

        if data.len() > self.config.max_packet_size {
            return Err(ContractError::stream_delivery(
                &self.name,
                image.frame_id,
                format!(
                    "packet of {} bytes exceeds max_packet_size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }
        Ok(data)
    }
}

impl OutputStream for NetworkStream {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_stream_deliver",
        skip(self, image),
        fields(stream = %self.name, frame_id = image.frame_id)
    )]
    async fn deliver(&mut self, image: &StampedImage) -> Result<(), ContractError> {
        let data = self.encode(image)?;
        let socket = self.socket.as_ref().ok_or_else(|| {
            ContractError::stream_delivery(&self.name, image.frame_id, "socket closed")
        })?;

        match socket.send(&data).await {
            Ok(sent) => {
                debug!(stream = %self.name, frame_id = image.frame_id, bytes = sent, "Sent");
                Ok(())
            }
            Err(e) => {
                error!(stream = %self.name, error = %e, "UDP send failed");
                Err(ContractError::stream_delivery(
                    &self.name,
                    image.frame_id,
                    e.to_string(),
                ))
            }
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // UDP doesn't buffer
        Ok(())
    }

    #[instrument(name = "network_stream_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(stream = %self.name, "NetworkStream closed");
        Ok(())
    }
}
