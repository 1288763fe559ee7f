//! Remote engine wire protocol
//!
//! Every message is a 4-byte little-endian length followed by a bincode
//! encoded [`EngineMessage`].

use contracts::{ContractError, FrameId, FrameRequest, RenderOutputSet, SceneId, SessionManifest};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted message body (a few 4K frames with all channels)
pub const MAX_MESSAGE_LEN: usize = 256 * 1024 * 1024;

/// Messages exchanged with the renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineMessage {
    /// client → engine: load the scene and instantiate entities
    Settings {
        scene: SceneId,
        manifest: SessionManifest,
    },
    /// engine → client: answer to `Settings`
    Ready { ok: bool, message: Option<String> },
    /// client → engine: push poses and render
    Frame(FrameRequest),
    /// engine → client: outputs of a rendered frame
    Rendered(RenderOutputSet),
    /// engine → client: the request failed
    Error {
        frame_id: Option<FrameId>,
        message: String,
    },
    /// client → engine: session is over
    Disconnect,
}

impl EngineMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineMessage::Settings { .. } => "settings",
            EngineMessage::Ready { .. } => "ready",
            EngineMessage::Frame(_) => "frame",
            EngineMessage::Rendered(_) => "rendered",
            EngineMessage::Error { .. } => "error",
            EngineMessage::Disconnect => "disconnect",
        }
    }
}

/// Encode and write one framed message.
pub async fn write_message<W>(writer: &mut W, message: &EngineMessage) -> Result<(), ContractError>
where
    W: AsyncWrite + Unpin,
{
    let body = bincode::serialize(message).map_err(|e| ContractError::EngineSessionLost {
        message: format!("failed to encode {} message: {e}", message.kind()),
    })?;
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len as usize <= MAX_MESSAGE_LEN)
        .ok_or_else(|| ContractError::Other(format!("message of {} bytes is too large", body.len())))?;

    writer.write_u32_le(len).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and decode one framed message.
///
/// A clean EOF before the length prefix is reported as a lost session.
pub async fn read_message<R>(reader: &mut R) -> Result<EngineMessage, ContractError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32_le().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ContractError::EngineSessionLost {
                message: "engine closed the connection".into(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    if len > MAX_MESSAGE_LEN {
        return Err(ContractError::EngineSessionLost {
            message: format!("message length {len} exceeds limit"),
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    bincode::deserialize(&body).map_err(|e| ContractError::EngineSessionLost {
        message: format!("malformed engine message: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{ChannelKind, EntityId, PixelLayout, RawImage, SensorOutputs};

    #[tokio::test]
    async fn test_rendered_frame_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        let mut outputs = RenderOutputSet::new(9);
        let mut sensor = SensorOutputs::new(EntityId::new("cam"));
        sensor.channels.insert(
            ChannelKind::Color,
            RawImage {
                width: 2,
                height: 1,
                layout: PixelLayout::Bgr8,
                data: Bytes::from_static(&[1, 2, 3, 4, 5, 6]),
            },
        );
        outputs.sensors.push(sensor);

        let writer = tokio::spawn(async move {
            write_message(&mut a, &EngineMessage::Rendered(outputs))
                .await
                .unwrap();
        });

        match read_message(&mut b).await.unwrap() {
            EngineMessage::Rendered(set) => {
                assert_eq!(set.frame_id, 9);
                let image = &set.sensor("cam").unwrap().channels[&ChannelKind::Color];
                assert_eq!(&image.data[..], &[1, 2, 3, 4, 5, 6]);
            }
            other => panic!("unexpected message {}", other.kind()),
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32_le(u32::MAX).await.unwrap();
        let err = read_message(&mut b).await.unwrap_err();
        assert!(err.is_session_fatal());
    }

    #[tokio::test]
    async fn test_eof_is_session_lost() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        let err = read_message(&mut b).await.unwrap_err();
        assert!(matches!(err, ContractError::EngineSessionLost { .. }));
    }
}
