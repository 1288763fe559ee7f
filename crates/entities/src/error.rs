//! Entity error types

use contracts::{ContractError, EntityId};
use thiserror::Error;

/// Entity specific error
#[derive(Debug, Error)]
pub enum EntityError {
    /// Pose with non-finite components or a zero quaternion
    #[error("invalid pose for '{entity_id}': {message}")]
    InvalidPose { entity_id: EntityId, message: String },

    /// Sensor parameters out of range
    #[error("invalid configuration for sensor '{sensor_id}': {message}")]
    InvalidSensorConfig { sensor_id: EntityId, message: String },

    /// Mutation of a property that is fixed for the session
    #[error("configuration of '{entity_id}' is locked: {reason}")]
    ConfigurationLocked {
        entity_id: EntityId,
        reason: &'static str,
    },

    /// Sensor attached but never configured
    #[error("sensor '{sensor_id}' was registered without being configured")]
    SensorNotConfigured { sensor_id: EntityId },
}

impl EntityError {
    pub fn locked(entity_id: &EntityId, reason: &'static str) -> Self {
        Self::ConfigurationLocked {
            entity_id: entity_id.clone(),
            reason,
        }
    }

    pub fn invalid_sensor(sensor_id: &EntityId, message: impl Into<String>) -> Self {
        Self::InvalidSensorConfig {
            sensor_id: sensor_id.clone(),
            message: message.into(),
        }
    }
}

impl From<EntityError> for ContractError {
    fn from(err: EntityError) -> Self {
        match err {
            EntityError::ConfigurationLocked { entity_id, reason } => {
                ContractError::ConfigurationLocked {
                    entity_id: entity_id.to_string(),
                    reason: reason.to_string(),
                }
            }
            other => ContractError::config_validation("entity", other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, EntityError>;
