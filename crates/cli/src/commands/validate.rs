//! `validate` command implementation.

use config_loader::{ConfigLoader, SessionBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::{CliError, Result};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    scene: String,
    backend: String,
    vehicle_id: String,
    camera_channels: usize,
    static_structure_count: usize,
    stream_count: usize,
    active_stream_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let (result, failure) = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| anyhow::anyhow!("Failed to serialize validation result: {e}"))?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    match failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn validate_config(args: &ValidateArgs) -> (ValidationResult, Option<CliError>) {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        let error = CliError::config_not_found(config_path.clone());
        return (
            ValidationResult {
                valid: false,
                config_path,
                error: Some(error.to_string()),
                warnings: Vec::new(),
                summary: None,
            },
            Some(error),
        );
    }

    match ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => (
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: ConfigLoader::warnings(&blueprint),
                summary: Some(summarize(&blueprint)),
            },
            None,
        ),
        Err(e) => (
            ValidationResult {
                valid: false,
                config_path,
                error: Some(e.to_string()),
                warnings: Vec::new(),
                summary: None,
            },
            Some(CliError::Config(e)),
        ),
    }
}

fn summarize(blueprint: &SessionBlueprint) -> ConfigSummary {
    ConfigSummary {
        version: format!("{:?}", blueprint.version),
        scene: blueprint.engine.scene.to_string(),
        backend: format!("{:?}", blueprint.engine.backend),
        vehicle_id: blueprint.vehicle.id.clone(),
        camera_channels: blueprint.camera().map_or(0, |c| c.channels.count()),
        static_structure_count: blueprint.static_structures.len(),
        stream_count: blueprint.streams.len(),
        active_stream_count: blueprint.active_streams().count(),
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Scene: {} ({})", summary.scene, summary.backend);
            println!("  Vehicle: {}", summary.vehicle_id);
            println!("  Camera channels: {}", summary.camera_channels);
            println!("  Static structures: {}", summary.static_structure_count);
            println!(
                "  Streams: {} ({} active)",
                summary.stream_count, summary.active_stream_count
            );
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "ok.toml", "[engine]\n\n[vehicle]\nid = \"quad\"\n");

        let (result, failure) = validate_config(&ValidateArgs {
            config: path,
            json: true,
        });
        assert!(result.valid);
        assert!(failure.is_none());
        assert!(!result.warnings.is_empty());
        assert_eq!(result.summary.unwrap().camera_channels, 0);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bad.toml", "[engine]\n\n[vehicle]\nid = \"\"\n");

        let err = run_validate(&ValidateArgs {
            config: path,
            json: false,
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_file() {
        let (result, failure) = validate_config(&ValidateArgs {
            config: PathBuf::from("/nonexistent/session.toml"),
            json: false,
        });
        assert!(!result.valid);
        assert!(matches!(failure, Some(CliError::ConfigNotFound { .. })));
    }
}
