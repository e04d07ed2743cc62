//! TransportSink - encodes scans and hands them to a `Transport`

use std::collections::HashMap;

use contracts::{ContractError, ScanFrame, ScanSink};
use tokio::sync::mpsc;
use tracing::{debug, instrument, trace};

use crate::transport::{TcpTransport, TcpTransportConfig, Transport, TransportEvent};

/// Sink over any outbound byte transport.
///
/// Sends while the transport is down are dropped and counted, never
/// reported as write failures.
pub struct TransportSink<T: Transport> {
    name: String,
    transport: T,
    sent: u64,
    dropped: u64,
}

impl<T: Transport> TransportSink<T> {
    pub fn new(name: impl Into<String>, transport: T) -> Self {
        Self {
            name: name.into(),
            transport,
            sent: 0,
            dropped: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Frames handed to the transport
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Frames dropped while disconnected
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl TransportSink<TcpTransport> {
    /// Spawn a TCP transport from params (for factory)
    ///
    /// Also returns the transport's event channel.
    #[instrument(name = "tcp_sink_from_params", skip(name, params))]
    pub fn tcp_from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), ContractError> {
        let name = name.into();
        let config = TcpTransportConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;
        let (transport, events) = TcpTransport::connect(name.clone(), config);
        Ok((Self::new(name, transport), events))
    }
}

impl<T: Transport> ScanSink for TransportSink<T> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "transport_sink_write",
        skip(self, frame),
        fields(sink = %self.name, sequence = frame.sequence)
    )]
    async fn write(&mut self, frame: &ScanFrame) -> Result<(), ContractError> {
        if self.transport.send_binary(frame.encode()) {
            self.sent += 1;
        } else {
            self.dropped += 1;
            trace!(sink = %self.name, sequence = frame.sequence, "transport down, scan dropped");
        }
        Ok(())
    }

    #[instrument(name = "transport_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "transport_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.transport.close();
        debug!(
            sink = %self.name,
            sent = self.sent,
            dropped = self.dropped,
            "TransportSink closed"
        );
        Ok(())
    }
}
