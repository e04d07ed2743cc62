//! # lidar-sim
//!
//! 旋转式 2D 激光雷达仿真器的命令行入口。
//!
//! - `run`：步进仿真时钟，合成扫描并分发到各 sink
//! - `validate`：只加载与校验配置
//! - `info`：打印每个传感器推导出的扫描几何

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use cli::{Cli, Commands};
use commands::{run_info, run_pipeline, run_validate};
use observability::ObservabilityConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Prometheus is installed by `run` only, once the port is known
    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: cli.log_level().to_string(),
    })?;

    info!(version = env!("CARGO_PKG_VERSION"), command = ?cli.command, "lidar-sim");

    let outcome = match cli.command {
        Commands::Run(ref args) => run_pipeline(args).await,
        Commands::Validate(ref args) => run_validate(args),
        Commands::Info(ref args) => run_info(args),
    };

    outcome.inspect_err(|e| error!(error = %e, "lidar-sim exited with an error"))
}
