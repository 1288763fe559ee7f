//! BroadcastStream - in-process fan-out of published images

use contracts::{ContractError, OutputStream, StampedImage};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

/// Stream that re-publishes images to in-process subscribers
///
/// 慢订阅者只会丢失旧图像 (`RecvError::Lagged`)，不会阻塞发布。
pub struct BroadcastStream {
    name: String,
    tx: broadcast::Sender<StampedImage>,
}

impl BroadcastStream {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Sender side, for creating subscribers after the stream is moved
    pub fn sender(&self) -> broadcast::Sender<StampedImage> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StampedImage> {
        self.tx.subscribe()
    }
}

impl OutputStream for BroadcastStream {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "broadcast_stream_deliver",
        skip(self, image),
        fields(stream = %self.name, frame_id = image.frame_id)
    )]
    async fn deliver(&mut self, image: &StampedImage) -> Result<(), ContractError> {
        match self.tx.send(image.clone()) {
            Ok(receivers) => debug!(stream = %self.name, receivers, "image broadcast"),
            // No subscriber is not an error
            Err(_) => debug!(stream = %self.name, "no subscribers, image discarded"),
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(stream = %self.name, "BroadcastStream closed");
        Ok(())
    }
}
