//! RemoteEngine - TCP client for an external renderer
//!
//! Speaks the framed protocol of [`crate::wire`]. A reader task owns the
//! receiving half of the socket and queues decoded messages, so a request
//! abandoned by the bridge's render timeout leaves the byte stream intact.
//! The late answer stays queued and is either taken by the retry of the same
//! frame or skipped as stale.

use std::time::Duration;

use contracts::{
    ContractError, EngineSession, FrameRequest, RenderOutputSet, SceneId, SessionManifest,
};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::wire::{read_message, write_message, EngineMessage};

/// Decoded messages waiting for the session
const REPLY_QUEUE_CAPACITY: usize = 16;

type Reply = Result<EngineMessage, ContractError>;

/// Remote engine session
pub struct RemoteEngine {
    address: String,
    connect_timeout: Duration,
    writer: Option<OwnedWriteHalf>,
    replies: Option<mpsc::Receiver<Reply>>,
    reader: Option<JoinHandle<()>>,
    rendered: Option<RenderOutputSet>,
    /// Set while a message is being written. Still set on entry means a
    /// write was cancelled midway and the byte stream is out of sync.
    writing: bool,
}

impl RemoteEngine {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Duration::from_secs(10),
            writer: None,
            replies: None,
            reader: None,
            rendered: None,
            writing: false,
        }
    }

    /// Bound the TCP handshake. Scene loading is bounded by the bridge.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    async fn send(&mut self, message: &EngineMessage) -> Result<(), ContractError> {
        if self.writing {
            return Err(ContractError::EngineSessionLost {
                message: "previous engine write was interrupted".into(),
            });
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ContractError::EngineSessionLost {
                message: "remote engine is not connected".into(),
            })?;
        self.writing = true;
        write_message(writer, message).await?;
        self.writing = false;
        Ok(())
    }

    /// Next queued message. Cancel safe.
    async fn next_reply(&mut self) -> Result<EngineMessage, ContractError> {
        let replies = self
            .replies
            .as_mut()
            .ok_or_else(|| ContractError::EngineSessionLost {
                message: "remote engine is not connected".into(),
            })?;
        match replies.recv().await {
            Some(reply) => reply,
            None => Err(ContractError::EngineSessionLost {
                message: "engine closed the connection".into(),
            }),
        }
    }

    fn stop_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.replies = None;
    }
}

impl Drop for RemoteEngine {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

/// Decode messages until the socket fails or the session goes away.
/// The first error is forwarded and ends the task.
async fn read_replies(mut reader: OwnedReadHalf, tx: mpsc::Sender<Reply>) {
    loop {
        let reply = read_message(&mut reader).await;
        let failed = reply.is_err();
        if tx.send(reply).await.is_err() || failed {
            break;
        }
    }
    debug!("engine reader stopped");
}

impl EngineSession for RemoteEngine {
    #[instrument(
        name = "remote_engine_connect",
        skip(self, manifest),
        fields(address = %self.address, scene = %scene)
    )]
    async fn connect(
        &mut self,
        scene: SceneId,
        manifest: &SessionManifest,
    ) -> Result<bool, ContractError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| ContractError::ConnectionFailed {
                message: format!("timed out connecting to {}", self.address),
            })?
            .map_err(|e| ContractError::ConnectionFailed {
                message: format!("{}: {e}", self.address),
            })?;
        stream.set_nodelay(true)?;

        self.stop_reader();
        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::channel(REPLY_QUEUE_CAPACITY);
        self.reader = Some(tokio::spawn(read_replies(read_half, tx)));
        self.replies = Some(rx);
        self.writer = Some(write_half);
        self.writing = false;

        self.send(&EngineMessage::Settings {
            scene,
            manifest: manifest.clone(),
        })
        .await?;

        match self.next_reply().await? {
            EngineMessage::Ready { ok: true, .. } => {
                info!("remote engine ready");
                Ok(true)
            }
            EngineMessage::Ready { ok: false, message } => {
                warn!(reason = message.as_deref().unwrap_or("none"), "remote engine refused");
                Ok(false)
            }
            EngineMessage::Error { message, .. } => {
                warn!(reason = %message, "remote engine refused");
                Ok(false)
            }
            other => Err(ContractError::EngineSessionLost {
                message: format!("unexpected '{}' message during handshake", other.kind()),
            }),
        }
    }

    /// Answers to other frames are skipped. A late answer to an abandoned
    /// attempt at the same frame satisfies the retry.
    #[instrument(
        name = "remote_engine_request_frame",
        skip(self, request),
        fields(frame_id = request.frame_id)
    )]
    async fn request_frame(&mut self, request: &FrameRequest) -> Result<(), ContractError> {
        let frame_id = request.frame_id;
        self.rendered = None;
        self.send(&EngineMessage::Frame(request.clone())).await?;

        loop {
            match self.next_reply().await? {
                EngineMessage::Rendered(outputs) if outputs.frame_id == frame_id => {
                    self.rendered = Some(outputs);
                    return Ok(());
                }
                EngineMessage::Rendered(outputs) => {
                    debug!(stale = outputs.frame_id, "skipping stale frame");
                }
                EngineMessage::Error {
                    frame_id: Some(id),
                    ..
                } if id != frame_id => {
                    debug!(stale = id, "skipping stale error");
                }
                EngineMessage::Error { message, .. } => {
                    return Err(ContractError::render_failed(frame_id, message));
                }
                other => {
                    return Err(ContractError::EngineSessionLost {
                        message: format!("unexpected '{}' message while rendering", other.kind()),
                    });
                }
            }
        }
    }

    async fn collect_outputs(&mut self) -> Result<RenderOutputSet, ContractError> {
        self.rendered
            .take()
            .ok_or_else(|| ContractError::Other("no rendered frame is pending".into()))
    }

    #[instrument(name = "remote_engine_disconnect", skip(self))]
    async fn disconnect(&mut self) -> Result<(), ContractError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        self.rendered = None;
        if !self.writing {
            if let Err(e) = write_message(&mut writer, &EngineMessage::Disconnect).await {
                debug!(error = %e, "engine gone before disconnect");
            }
        }
        self.writing = false;
        // 对端可能已关闭，忽略 shutdown 错误
        let _ = writer.shutdown().await;
        self.stop_reader();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ChannelKind, EntityId, PixelLayout, RawImage, SensorOutputs};
    use tokio::net::TcpListener;

    /// Fake renderer: accepts the session, renders every frame except
    /// `fail_at`, answers until the client disconnects.
    async fn fake_engine(accept: bool, fail_at: Option<u64>) -> String {
        slow_engine(accept, fail_at, Duration::ZERO).await
    }

    /// Same as `fake_engine`, but sits on the first frame for `first_delay`
    async fn slow_engine(accept: bool, fail_at: Option<u64>, first_delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut delay = first_delay;
            loop {
                let Ok(message) = read_message(&mut socket).await else {
                    return;
                };
                if matches!(message, EngineMessage::Frame(_)) && !delay.is_zero() {
                    tokio::time::sleep(std::mem::take(&mut delay)).await;
                }
                let reply = match message {
                    EngineMessage::Settings { .. } => EngineMessage::Ready {
                        ok: accept,
                        message: (!accept).then(|| "scene unavailable".to_string()),
                    },
                    EngineMessage::Frame(request) if Some(request.frame_id) == fail_at => {
                        EngineMessage::Error {
                            frame_id: Some(request.frame_id),
                            message: "gpu fault".into(),
                        }
                    }
                    EngineMessage::Frame(request) => {
                        let mut outputs = RenderOutputSet::new(request.frame_id);
                        let mut sensor = SensorOutputs::new(EntityId::new("cam"));
                        sensor.channels.insert(
                            ChannelKind::Color,
                            RawImage {
                                width: 1,
                                height: 1,
                                layout: PixelLayout::Bgr8,
                                data: vec![0, 0, 255].into(),
                            },
                        );
                        outputs.sensors.push(sensor);
                        EngineMessage::Rendered(outputs)
                    }
                    EngineMessage::Disconnect => return,
                    _ => continue,
                };
                if write_message(&mut socket, &reply).await.is_err() {
                    return;
                }
            }
        });

        address
    }

    fn request(frame_id: u64) -> FrameRequest {
        FrameRequest {
            frame_id,
            vehicles: vec![],
        }
    }

    #[tokio::test]
    async fn test_handshake_and_frames() {
        let address = fake_engine(true, Some(1)).await;
        let mut engine = RemoteEngine::new(address);
        assert!(engine
            .connect(SceneId::Industrial, &SessionManifest::default())
            .await
            .unwrap());

        engine.request_frame(&request(0)).await.unwrap();
        let outputs = engine.collect_outputs().await.unwrap();
        assert_eq!(outputs.frame_id, 0);
        assert_eq!(outputs.channel_count(), 1);

        let err = engine.request_frame(&request(1)).await.unwrap_err();
        assert!(matches!(err, ContractError::RenderFailed { frame_id: 1, .. }));

        // Render failures keep the session usable
        engine.request_frame(&request(2)).await.unwrap();
        engine.disconnect().await.unwrap();
        assert!(!engine.is_connected());
    }

    #[tokio::test]
    async fn test_refused_session() {
        let address = fake_engine(false, None).await;
        let mut engine = RemoteEngine::new(address);
        assert!(!engine
            .connect(SceneId::Garage, &SessionManifest::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_connection_failed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut engine = RemoteEngine::new(address);
        let err = engine
            .connect(SceneId::Industrial, &SessionManifest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::ConnectionFailed { .. }));
    }

    #[tokio::test]
    async fn test_render_timeout_keeps_remote_session_retryable() {
        use crate::bridge::EngineBridge;
        use contracts::{ConnectionState, Vector3};
        use entities::EntityProxy;

        let address = slow_engine(true, None, Duration::from_millis(200)).await;
        let mut bridge =
            EngineBridge::new(RemoteEngine::new(address)).with_render_timeout(Duration::from_millis(50));
        bridge
            .add_vehicle(EntityProxy::vehicle("quad", Vector3::new(0.5, 0.5, 0.5)))
            .unwrap();
        assert!(bridge.connect(SceneId::Industrial).await.unwrap());

        let err = bridge.request_frame(0).await.unwrap_err();
        assert!(matches!(err, crate::BridgeError::RenderFailed { frame_id: 0, .. }));
        assert_eq!(bridge.state(), ConnectionState::Ready);

        // backoff, then retry the same id: the late answer is still queued
        tokio::time::sleep(Duration::from_millis(300)).await;
        bridge.request_frame(0).await.unwrap();
        assert_eq!(bridge.collect_outputs().await.unwrap().frame_id, 0);

        // the retry's own answer is skipped as stale
        bridge.request_frame(1).await.unwrap();
        assert_eq!(bridge.collect_outputs().await.unwrap().frame_id, 1);
        assert_eq!(bridge.state(), ConnectionState::Ready);
        bridge.close().await.unwrap();
    }
}
