//! Transport - connection + byte-stream boundary
//!
//! Outbound sends are queued and never block the caller. Inbound bytes and
//! connection changes are delivered as `TransportEvent`s on a bounded channel.

mod tcp;

use bytes::Bytes;
use thiserror::Error;

pub use self::tcp::{TcpTransport, TcpTransportConfig, TransportStats};

/// Connection lifecycle and inbound data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Closed,
    Error(String),
    BinaryReceived(Bytes),
}

/// Transport-specific errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("missing '{0}' parameter")]
    MissingParam(&'static str),

    #[error("invalid '{param}' parameter '{value}': {message}")]
    InvalidParam {
        param: &'static str,
        value: String,
        message: String,
    },
}

/// Outbound byte channel
pub trait Transport: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Queue `bytes` for the next send cycle.
    ///
    /// Returns `false` when the bytes were dropped (not connected).
    fn send_binary(&self, bytes: Bytes) -> bool;

    /// Stop the connection loop; later sends are dropped
    fn close(&self);
}
