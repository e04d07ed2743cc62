//! # Observability
//!
//! 扫描管线的日志与指标出口。
//!
//! 日志经 `tracing-subscriber` 输出到 stderr（格式可选 JSON / Pretty / Compact），
//! 指标通过 `metrics` 门面记录，可选地由 Prometheus exporter 暴露为 HTTP 端点。
//! [`ScanMetricsAggregator`] 在进程内累计每个传感器的扫描统计，供运行结束时打印摘要。
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig {
//!     log_format: LogFormat::Compact,
//!     ..Default::default()
//! })?;
//!
//! for frame in &simulation.step(dt).frames {
//!     observability::record_scan_metrics(frame);
//! }
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::metrics::{
    record_scan_metrics, record_scan_skipped, record_step_duration_ms, record_transport_event,
    MetricsSummary, RunningStats, ScanMetricsAggregator, SensorAggregate, SensorSummary,
    StatsSummary,
};

/// Port the Prometheus endpoint binds when none is given
pub const DEFAULT_METRICS_PORT: u16 = 9100;

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// `None` leaves the exporter uninstalled; `metrics` calls become no-ops
    pub metrics_port: Option<u16>,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(DEFAULT_METRICS_PORT),
            default_log_level: "info".to_string(),
        }
    }
}

/// Output shape of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

/// 安装全局 subscriber，并按需启动 Prometheus exporter。
///
/// 日志写到 stderr，stdout 留给命令输出。进程内只能调用一次。
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let format = config.log_format;
    let json = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
    });
    let pretty =
        (format == LogFormat::Pretty).then(|| fmt::layer().pretty().with_writer(std::io::stderr));
    let compact =
        (format == LogFormat::Compact).then(|| fmt::layer().compact().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .with(compact)
        .try_init()
        .context("Could not install the tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(log_format = ?format, metrics_port = ?config.metrics_port, "Logging ready");
    Ok(())
}

/// Install only the Prometheus recorder, serving `/metrics` on `port`
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .set_buckets_for_metric(
            Matcher::Full("sim_step_duration_ms".to_string()),
            &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0],
        )
        .context("Invalid step duration buckets")?
        .set_buckets_for_metric(
            Matcher::Full("lidar_scan_hit_ratio".to_string()),
            &[0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0],
        )
        .context("Invalid hit ratio buckets")?
        .install()
        .context("Could not install the Prometheus recorder")?;

    tracing::info!(port, "Prometheus exporter listening");
    Ok(())
}
