//! Sink implementations
//!
//! Contains LogSink, FileSink, UdpSink and TransportSink.

mod file;
mod log;
mod transport;
mod udp;

pub use self::file::{FileFormat, FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::transport::TransportSink;
pub use self::udp::{UdpFormat, UdpSink, UdpSinkConfig};
