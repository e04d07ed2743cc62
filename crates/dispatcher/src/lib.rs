//! # Dispatcher
//!
//! 扫描数据分发模块。
//!
//! 负责：
//! - 消费 `ScanFrame`
//! - Fan-out 到多个 sinks（log / file / udp / tcp）
//! - 隔离慢 sink，不阻塞仿真步进
//! - 提供 `Transport` 抽象与可重连的 `TcpTransport`

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;
pub mod transport;

pub use contracts::{ScanFrame, ScanSink};
pub use dispatcher::{create_dispatcher, Dispatcher, TransportEvents};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink, TransportSink, UdpSink};
pub use transport::{
    TcpTransport, TcpTransportConfig, Transport, TransportError, TransportEvent, TransportStats,
};
