//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use std::path::Path;

use config_loader::{presets, ConfigLoader, SessionBlueprint};
use tracing::info;

use crate::cli::SourceArgs;
use crate::error::{CliError, Result};

/// Default configuration file when neither `--config` nor `--preset` is given
const DEFAULT_CONFIG: &str = "config.toml";

/// Load the session blueprint named by `--config` / `--preset`.
///
/// Returns the blueprint and a label describing where it came from.
pub(crate) fn load_blueprint(source: &SourceArgs) -> Result<(SessionBlueprint, String)> {
    if let Some(name) = &source.preset {
        let blueprint = presets::by_name(name).ok_or_else(|| CliError::UnknownPreset {
            name: name.clone(),
            available: presets::NAMES.join(", "),
        })?;
        info!(preset = %name, "Using built-in session");
        return Ok((blueprint, format!("preset:{name}")));
    }

    let path = source
        .config
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG));
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }

    info!(config = %path.display(), "Loading configuration");
    let blueprint = ConfigLoader::load_from_path(path).map_err(CliError::Config)?;
    Ok((blueprint, path.display().to_string()))
}
