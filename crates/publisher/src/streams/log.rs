//! LogStream - logs image summaries via tracing

use contracts::{ContractError, OutputStream, StampedImage};
use tracing::{info, instrument};

/// Stream that only logs what it would have published
pub struct LogStream {
    name: String,
    delivered: u64,
}

impl LogStream {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delivered: 0,
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl OutputStream for LogStream {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_stream_deliver",
        skip(self, image),
        fields(stream = %self.name, frame_id = image.frame_id)
    )]
    async fn deliver(&mut self, image: &StampedImage) -> Result<(), ContractError> {
        self.delivered += 1;
        info!(
            stream = %self.name,
            sensor_id = %image.sensor_id,
            channel = %image.channel,
            frame_id = image.frame_id,
            stamp = %image.stamp,
            encoding = %image.encoding,
            width = image.width,
            height = image.height,
            bytes = image.data.len(),
            "image published"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_stream_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(stream = %self.name, delivered = self.delivered, "LogStream closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{CaptureStamp, ChannelKind, EntityId, ImageEncoding};

    #[tokio::test]
    async fn test_log_stream_counts_deliveries() {
        let mut stream = LogStream::new("/rgb");
        let image = StampedImage {
            stream: "/rgb".into(),
            sensor_id: EntityId::new("cam"),
            channel: ChannelKind::Color,
            frame_id: 0,
            stamp: CaptureStamp::now(),
            encoding: ImageEncoding::Bgr8,
            width: 1,
            height: 1,
            step: 3,
            data: Bytes::from_static(&[1, 2, 3]),
        };

        stream.deliver(&image).await.unwrap();
        stream.deliver(&image).await.unwrap();
        assert_eq!(stream.delivered(), 2);
        assert_eq!(stream.name(), "/rgb");
        stream.close().await.unwrap();
    }
}
