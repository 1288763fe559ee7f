//! Engine bridge error types

use contracts::{ConnectionState, ContractError, FrameId};
use entities::EntityError;
use thiserror::Error;

/// Engine bridge specific error
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Registration or connect attempted after `connect`
    #[error("engine already connected, cannot {operation}")]
    AlreadyConnected { operation: String },

    /// Two entities registered under the same identity
    #[error("entity '{entity_id}' is already registered")]
    DuplicateEntity { entity_id: String },

    /// Handle does not resolve to a registered vehicle
    #[error("unknown entity '{entity_id}'")]
    UnknownEntity { entity_id: String },

    /// Frame operation while the bridge is not Ready
    #[error("engine bridge is not ready (state: {state:?})")]
    NotReady { state: ConnectionState },

    /// A second request before the previous frame was collected
    #[error("frame {outstanding} is still outstanding, cannot request frame {requested}")]
    FrameOutstanding {
        outstanding: FrameId,
        requested: FrameId,
    },

    /// `collect_outputs` without a pending request
    #[error("no frame is outstanding")]
    NoOutstandingFrame,

    /// Engine failed to render or answer in time. The bridge stays Ready.
    #[error("render of frame {frame_id} failed: {message}")]
    RenderFailed { frame_id: FrameId, message: String },

    /// Irrecoverable session error. The bridge is Failed.
    #[error("engine session lost: {message}")]
    SessionLost { message: String },

    /// Entity validation error
    #[error(transparent)]
    Entity(#[from] EntityError),
}

impl BridgeError {
    pub fn render_failed(frame_id: FrameId, message: impl Into<String>) -> Self {
        Self::RenderFailed {
            frame_id,
            message: message.into(),
        }
    }

    /// Whether the bridge can no longer render after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionLost { .. })
    }
}

impl From<BridgeError> for ContractError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::AlreadyConnected { operation } => {
                ContractError::AlreadyConnected { operation }
            }
            BridgeError::RenderFailed { frame_id, message } => {
                ContractError::RenderFailed { frame_id, message }
            }
            BridgeError::SessionLost { message } => ContractError::EngineSessionLost { message },
            BridgeError::Entity(e) => e.into(),
            other => ContractError::Other(other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, BridgeError>;
