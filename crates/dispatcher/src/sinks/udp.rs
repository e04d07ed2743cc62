//! UdpSink - fire-and-forget scan streaming

use contracts::{ContractError, ScanFrame, ScanSink};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument, warn};

/// Largest UDP payload over IPv4
const MAX_DATAGRAM: usize = 65_507;

/// Payload encoding for each datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UdpFormat {
    /// Binary wire frame
    #[default]
    Lidr,
    /// `ScanMessage` as JSON
    Json,
}

/// Configuration for UdpSink
#[derive(Debug, Clone)]
pub struct UdpSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    pub format: UdpFormat,
    /// Datagrams above this size are skipped
    pub max_packet_size: usize,
}

impl UdpSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("lidr") | None => UdpFormat::Lidr,
            Some("json") => UdpFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(MAX_DATAGRAM)
            .min(MAX_DATAGRAM);

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Sink that sends one datagram per scan
pub struct UdpSink {
    name: String,
    config: UdpSinkConfig,
    socket: Option<UdpSocket>,
    oversized: u64,
}

impl UdpSink {
    /// Create a new UdpSink
    #[instrument(name = "udp_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: UdpSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind_addr = if config.addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(&config.addr).await?;

        debug!(sink = %name, target = %config.addr, "UdpSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
            oversized: 0,
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "udp_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config =
            UdpSinkConfig::from_params(params).map_err(|e| ContractError::sink_connection(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    /// Scans skipped for exceeding `max_packet_size`
    pub fn oversized(&self) -> u64 {
        self.oversized
    }

    fn serialize_frame(&self, frame: &ScanFrame) -> Result<Vec<u8>, ContractError> {
        match self.config.format {
            UdpFormat::Lidr => Ok(frame.encode().to_vec()),
            UdpFormat::Json => serde_json::to_vec(frame.scan.as_ref())
                .map_err(|e| ContractError::sink_write(&self.name, format!("json error: {}", e))),
        }
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))
    }

    async fn transmit(&self, socket: &UdpSocket, data: &[u8], sequence: u64) {
        match socket.send(data).await {
            Ok(sent) => {
                debug!(sink = %self.name, sequence, bytes = sent, "Sent");
            }
            Err(e) => {
                // UDP is best-effort
                error!(sink = %self.name, error = %e, "UDP send failed");
            }
        }
    }
}

impl ScanSink for UdpSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "udp_sink_write",
        skip(self, frame),
        fields(sink = %self.name, sequence = frame.sequence)
    )]
    async fn write(&mut self, frame: &ScanFrame) -> Result<(), ContractError> {
        let data = self.serialize_frame(frame)?;
        if data.len() > self.config.max_packet_size {
            self.oversized += 1;
            warn!(
                sink = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "Datagram too large, scan skipped"
            );
            return Ok(());
        }

        let socket = self.socket()?;
        self.transmit(socket, &data, frame.sequence).await;
        Ok(())
    }

    #[instrument(name = "udp_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "udp_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, oversized = self.oversized, "UdpSink closed");
        Ok(())
    }
}
