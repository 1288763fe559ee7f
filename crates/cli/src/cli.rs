//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::SceneId;
use std::path::PathBuf;

/// flightsync - synchronized simulate, render and publish loop
#[derive(Parser, Debug)]
#[command(
    name = "flightsync",
    author,
    version,
    about = "Synchronized vehicle simulation, rendering and image publishing",
    long_about = "Drives a vehicle through a rendering engine one frame at a time.\n\n\
                  Registers the vehicle, its camera and static structures, opens a scene, \n\
                  then renders and publishes every enabled image channel with a shared \n\
                  timestamp per frame."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FLIGHTSYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FLIGHTSYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the frame loop
    Run(RunArgs),

    /// Validate a configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Where the session blueprint comes from
#[derive(clap::Args, Debug, Clone)]
#[group(required = false, multiple = false)]
pub struct SourceArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "FLIGHTSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use a built-in session instead of a file (camera_streams, static_gate)
    #[arg(long)]
    pub preset: Option<String>,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Use the in-process mock engine regardless of `engine.backend`
    #[arg(long)]
    pub mock: bool,

    /// Override the remote engine address (host:port)
    #[arg(long, env = "FLIGHTSYNC_ENGINE_ADDRESS")]
    pub address: Option<String>,

    /// Override the scene
    #[arg(long, value_enum, env = "FLIGHTSYNC_SCENE")]
    pub scene: Option<SceneArg>,

    /// Maximum number of frames to render (0 = unlimited)
    #[arg(long, env = "FLIGHTSYNC_MAX_FRAMES")]
    pub max_frames: Option<u64>,

    /// Override the tick rate in Hz (0 = as fast as the engine renders)
    #[arg(long, env = "FLIGHTSYNC_TICK_RATE")]
    pub tick_rate: Option<f64>,

    /// Override render retries per frame
    #[arg(long, env = "FLIGHTSYNC_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Validate configuration and exit without running the loop
    #[arg(long)]
    pub dry_run: bool,

    /// How long streams may drain on shutdown, in milliseconds (0 = wait)
    #[arg(long, default_value = "5000", env = "FLIGHTSYNC_DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "FLIGHTSYNC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml", env = "FLIGHTSYNC_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show stream routes
    #[arg(long)]
    pub streams: bool,

    /// Print the session manifest sent to the engine on connect
    #[arg(long)]
    pub manifest: bool,

    /// List built-in presets and exit
    #[arg(long)]
    pub list_presets: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

/// Scene names accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneArg {
    Industrial,
    Warehouse,
    Garage,
    NatureForest,
    Tunnels,
}

impl From<SceneArg> for SceneId {
    fn from(scene: SceneArg) -> Self {
        match scene {
            SceneArg::Industrial => SceneId::Industrial,
            SceneArg::Warehouse => SceneId::Warehouse,
            SceneArg::Garage => SceneId::Garage,
            SceneArg::NatureForest => SceneId::NatureForest,
            SceneArg::Tunnels => SceneId::Tunnels,
        }
    }
}
