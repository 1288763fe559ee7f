//! Error types for CLI operations.

use contracts::ContractError;
use frame_loop::LoopError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// `--preset` names no built-in session
    #[error("Unknown preset '{name}' (available: {available})")]
    UnknownPreset { name: String, available: String },

    /// Configuration could not be parsed or failed validation
    #[error("Invalid configuration: {0}")]
    Config(#[source] ContractError),

    /// Engine never became ready
    #[error("Engine connection failed: {message}")]
    Connection { message: String },

    /// Render failed during a session
    #[error("Render failed mid-session: {message}")]
    Render { message: String },

    /// Frame loop stopped for another reason
    #[error("Frame loop failed: {0}")]
    Loop(#[source] LoopError),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Process exit code: 2 configuration, 3 connection, 4 render, 1 anything else
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::ConfigNotFound { .. }
            | CliError::UnknownPreset { .. }
            | CliError::Config(_) => 2,
            CliError::Connection { .. } => 3,
            CliError::Render { .. } => 4,
            CliError::Loop(_) | CliError::Other(_) => 1,
        }
    }
}

impl From<ContractError> for CliError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::ConnectionFailed { message } => CliError::Connection { message },
            ContractError::RenderFailed { .. } | ContractError::EngineSessionLost { .. } => {
                CliError::Render {
                    message: err.to_string(),
                }
            }
            other => CliError::Config(other),
        }
    }
}

impl From<LoopError> for CliError {
    fn from(err: LoopError) -> Self {
        match err {
            LoopError::ConnectionFailed { .. } => CliError::Connection {
                message: err.to_string(),
            },
            LoopError::RenderFailed { .. } | LoopError::SessionLost { .. } => CliError::Render {
                message: err.to_string(),
            },
            LoopError::Publisher(_) => CliError::Config(ContractError::Other(err.to_string())),
            other => CliError::Loop(other),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SceneId;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::config_not_found("x.toml").exit_code(), 2);
        assert_eq!(
            CliError::from(ContractError::config_validation("vehicle.id", "empty")).exit_code(),
            2
        );
        assert_eq!(
            CliError::from(LoopError::ConnectionFailed {
                scene: SceneId::Garage
            })
            .exit_code(),
            3
        );
        assert_eq!(
            CliError::from(ContractError::render_failed(7, "boom")).exit_code(),
            4
        );
        assert_eq!(CliError::from(anyhow::anyhow!("other")).exit_code(), 1);
    }
}
