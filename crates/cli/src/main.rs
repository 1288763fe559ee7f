//! # flightsync CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 帧循环编排与生命周期管理
//! - 优雅关闭处理
//!
//! 退出码：0 成功，2 配置错误，3 连接失败，4 会话中渲染失败，1 其他。

mod cli;
mod commands;
mod error;
mod pipeline;

use std::process::ExitCode;

use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_pipeline, run_validate};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = init_observability(&cli) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "flightsync starting");

    // Execute command
    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, exit_code = e.exit_code(), "Command failed");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Initialize tracing and, for `run`, the Prometheus exporter
fn init_observability(cli: &Cli) -> anyhow::Result<()> {
    let mut config = ObservabilityConfig::from_verbosity(cli.verbose, cli.quiet)
        .with_log_format(cli.log_format.into());
    if let Commands::Run(args) = &cli.command {
        config = config.with_metrics_port(args.metrics_port);
    }
    observability::init_with_config(config)
}
