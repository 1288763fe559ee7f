//! Publisher error types

use contracts::ChannelKind;
use thiserror::Error;

/// Publisher-specific errors
#[derive(Debug, Error)]
pub enum PublisherError {
    /// Stream creation error
    #[error("failed to create stream '{name}': {message}")]
    StreamCreation { name: String, message: String },

    /// Two streams bound to the same sensor channel
    #[error("channel {channel} of sensor '{sensor_id}' is already routed to '{existing}'")]
    DuplicateRoute {
        sensor_id: String,
        channel: ChannelKind,
        existing: String,
    },

    /// Stream error (from contract)
    #[error("stream error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublisherError {
    /// Create a stream creation error
    pub fn stream_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StreamCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
