//! Frame loop error types

use contracts::{ContractError, FrameId, SceneId};
use engine_bridge::BridgeError;
use entities::EntityError;
use publisher::PublisherError;
use thiserror::Error;

use crate::runner::LoopState;

/// Frame loop errors
#[derive(Debug, Error)]
pub enum LoopError {
    /// Engine refused the scene or could not be reached
    #[error("engine connection failed for scene {scene}")]
    ConnectionFailed { scene: SceneId },

    /// Render failed and retries are exhausted
    #[error("render of frame {frame_id} failed after {attempts} attempt(s): {source}")]
    RenderFailed {
        frame_id: FrameId,
        attempts: u32,
        #[source]
        source: BridgeError,
    },

    /// Engine session is gone
    #[error("engine session lost at frame {frame_id}: {source}")]
    SessionLost {
        frame_id: FrameId,
        #[source]
        source: BridgeError,
    },

    /// Motion policy produced a state the proxy rejected
    #[error("motion policy rejected at frame {frame_id}: {source}")]
    InvalidMotion {
        frame_id: FrameId,
        #[source]
        source: BridgeError,
    },

    /// Operation not allowed in the current state
    #[error("cannot {operation} while loop is {state:?}")]
    InvalidState {
        state: LoopState,
        operation: &'static str,
    },

    /// Bridge error outside the tick path
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Output streams could not be opened
    #[error(transparent)]
    Publisher(#[from] PublisherError),
}

impl From<EntityError> for LoopError {
    fn from(err: EntityError) -> Self {
        LoopError::Bridge(err.into())
    }
}

impl LoopError {
    pub fn invalid_state(state: LoopState, operation: &'static str) -> Self {
        Self::InvalidState { state, operation }
    }

    /// Frame the loop stopped at, if it stopped inside a tick
    pub fn frame_id(&self) -> Option<FrameId> {
        match self {
            Self::RenderFailed { frame_id, .. }
            | Self::SessionLost { frame_id, .. }
            | Self::InvalidMotion { frame_id, .. } => Some(*frame_id),
            _ => None,
        }
    }
}

impl From<LoopError> for ContractError {
    fn from(err: LoopError) -> Self {
        match err {
            LoopError::ConnectionFailed { scene } => ContractError::ConnectionFailed {
                message: format!("engine refused scene {scene}"),
            },
            LoopError::RenderFailed {
                frame_id, source, ..
            } => ContractError::render_failed(frame_id, source.to_string()),
            LoopError::SessionLost { source, .. } => ContractError::EngineSessionLost {
                message: source.to_string(),
            },
            LoopError::Bridge(e) => e.into(),
            LoopError::Publisher(PublisherError::Contract(e)) => e,
            other => ContractError::Other(other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, LoopError>;
