//! Layered error definitions
//!
//! Categorized by source: config / entity / engine / stream

use thiserror::Error;

use crate::FrameId;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Entity Errors =====
    /// Immutable sensor/entity property mutated after registration
    #[error("configuration of '{entity_id}' is locked: {reason}")]
    ConfigurationLocked { entity_id: String, reason: String },

    /// Entity registration attempted after connect
    #[error("engine already connected, cannot {operation}")]
    AlreadyConnected { operation: String },

    // ===== Engine Errors =====
    /// Engine session could not be established
    #[error("engine connection failed: {message}")]
    ConnectionFailed { message: String },

    /// A requested frame could not be completed
    #[error("render of frame {frame_id} failed: {message}")]
    RenderFailed { frame_id: FrameId, message: String },

    /// The engine dropped the session; no further frames can be rendered
    #[error("engine session lost: {message}")]
    EngineSessionLost { message: String },

    // ===== Stream Errors =====
    /// A single channel failed to publish
    #[error("stream '{stream}' delivery failed for frame {frame_id}: {message}")]
    StreamDeliveryFailed {
        stream: String,
        frame_id: FrameId,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create render failure
    pub fn render_failed(frame_id: FrameId, message: impl Into<String>) -> Self {
        Self::RenderFailed {
            frame_id,
            message: message.into(),
        }
    }

    /// Create stream delivery failure
    pub fn stream_delivery(
        stream: impl Into<String>,
        frame_id: FrameId,
        message: impl Into<String>,
    ) -> Self {
        Self::StreamDeliveryFailed {
            stream: stream.into(),
            frame_id,
            message: message.into(),
        }
    }

    /// Whether the engine session survives this error.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::EngineSessionLost { .. } | Self::ConnectionFailed { .. }
        )
    }
}
