//! TcpTransport - reconnecting TCP client with a bounded send queue

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use ringbuf::{traits::*, HeapRb};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{Transport, TransportError, TransportEvent};

/// Configuration for TcpTransport
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Remote endpoint
    pub addr: SocketAddr,
    /// Pause between connection attempts
    pub reconnect_delay: Duration,
    /// Outbound frames held while the socket is busy (oldest dropped first)
    pub send_queue: usize,
    /// Capacity of the event channel
    pub event_capacity: usize,
    /// Read chunk size for inbound bytes
    pub read_buffer: usize,
}

impl TcpTransportConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            reconnect_delay: Duration::from_millis(1000),
            send_queue: 64,
            event_capacity: 256,
            read_buffer: 4096,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_send_queue(mut self, capacity: usize) -> Self {
        self.send_queue = capacity;
        self
    }

    /// Create config from params map
    ///
    /// `addr` is required; `reconnect_ms` and `send_queue` are optional.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, TransportError> {
        let addr_str = params
            .get("addr")
            .ok_or(TransportError::MissingParam("addr"))?;
        let addr: SocketAddr = addr_str.parse().map_err(|e: std::net::AddrParseError| {
            TransportError::InvalidParam {
                param: "addr",
                value: addr_str.clone(),
                message: e.to_string(),
            }
        })?;

        let mut config = Self::new(addr);
        if let Some(value) = params.get("reconnect_ms") {
            let millis: u64 = parse_param("reconnect_ms", value)?;
            config.reconnect_delay = Duration::from_millis(millis);
        }
        if let Some(value) = params.get("send_queue") {
            config.send_queue = parse_param("send_queue", value)?;
        }
        Ok(config)
    }
}

fn parse_param<T>(param: &'static str, value: &str) -> Result<T, TransportError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| TransportError::InvalidParam {
        param,
        value: value.to_string(),
        message: e.to_string(),
    })
}

/// Transport counters
#[derive(Debug, Default)]
pub struct TransportStats {
    sent_frames: AtomicU64,
    sent_bytes: AtomicU64,
    received_bytes: AtomicU64,
    dropped_disconnected: AtomicU64,
    dropped_overflow: AtomicU64,
    connects: AtomicU64,
}

impl TransportStats {
    pub fn sent_frames(&self) -> u64 {
        self.sent_frames.load(Ordering::Relaxed)
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes.load(Ordering::Relaxed)
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes.load(Ordering::Relaxed)
    }

    /// Sends issued while not connected
    pub fn dropped_disconnected(&self) -> u64 {
        self.dropped_disconnected.load(Ordering::Relaxed)
    }

    /// Queued frames evicted by newer ones
    pub fn dropped_overflow(&self) -> u64 {
        self.dropped_overflow.load(Ordering::Relaxed)
    }

    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }
}

/// State shared between the handle and the connection task
struct Shared {
    connected: AtomicBool,
    queue: Mutex<HeapRb<Bytes>>,
    wake: Notify,
    stats: TransportStats,
}

impl Shared {
    fn new(send_queue: usize) -> Self {
        Self {
            connected: AtomicBool::new(false),
            queue: Mutex::new(HeapRb::new(send_queue.max(1))),
            wake: Notify::new(),
            stats: TransportStats::default(),
        }
    }

    fn queue(&self) -> MutexGuard<'_, HeapRb<Bytes>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue for the live connection, evicting the oldest entry when full.
    ///
    /// `connected` is read under the queue lock, so nothing queued here can
    /// outlive [`Shared::disconnect`] and leak onto the next connection.
    fn enqueue(&self, bytes: Bytes) -> bool {
        {
            let mut queue = self.queue();
            if !self.connected.load(Ordering::Acquire) {
                self.stats
                    .dropped_disconnected
                    .fetch_add(1, Ordering::Relaxed);
                return false;
            }
            if queue.is_full() {
                let _ = queue.try_pop();
                self.stats.dropped_overflow.fetch_add(1, Ordering::Relaxed);
            }
            let _ = queue.try_push(bytes);
        }
        self.wake.notify_one();
        true
    }

    fn dequeue(&self) -> Option<Bytes> {
        self.queue().try_pop()
    }

    /// Mark the connection down and discard what it did not send
    fn disconnect(&self) {
        let mut queue = self.queue();
        self.connected.store(false, Ordering::Release);
        queue.clear();
    }
}

/// Why a live connection ended
enum Disconnect {
    Shutdown,
    PeerClosed,
    Failed(String),
}

/// TCP client that keeps reconnecting until closed
pub struct TcpTransport {
    name: String,
    addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TcpTransport {
    /// Spawn the connection loop. Must be called inside a tokio runtime.
    #[instrument(name = "tcp_transport_connect", skip(name, config), fields(addr = %config.addr))]
    pub fn connect(
        name: impl Into<String>,
        config: TcpTransportConfig,
    ) -> (Self, mpsc::Receiver<TransportEvent>) {
        let name = name.into();
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared::new(config.send_queue));
        let addr = config.addr;

        let task = tokio::spawn(connection_loop(
            name.clone(),
            config,
            Arc::clone(&shared),
            event_tx,
            shutdown_rx,
        ));

        (
            Self {
                name,
                addr,
                shared,
                shutdown: shutdown_tx,
                task,
            },
            event_rx,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stats(&self) -> &TransportStats {
        &self.shared.stats
    }

    /// Close and wait for the connection task to finish
    pub async fn shutdown(self) {
        self.close();
        if let Err(e) = self.task.await {
            warn!(transport = %self.name, error = ?e, "transport task panicked");
        }
    }
}

impl Transport for TcpTransport {
    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn send_binary(&self, bytes: Bytes) -> bool {
        self.shared.enqueue(bytes)
    }

    fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

fn emit(events: &mpsc::Sender<TransportEvent>, event: TransportEvent) {
    if let Err(e) = events.try_send(event) {
        debug!(error = %e, "transport event dropped");
    }
}

#[instrument(
    name = "tcp_transport_loop",
    skip(config, shared, events, shutdown),
    fields(addr = %config.addr)
)]
async fn connection_loop(
    name: String,
    config: TcpTransportConfig,
    shared: Arc<Shared>,
    events: mpsc::Sender<TransportEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let attempt = tokio::select! {
            result = TcpStream::connect(config.addr) => result,
            _ = shutdown.changed() => break,
        };

        match attempt {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(transport = %name, error = %e, "set_nodelay failed");
                }
                shared.stats.connects.fetch_add(1, Ordering::Relaxed);
                shared.connected.store(true, Ordering::Release);
                info!(transport = %name, "transport connected");
                emit(&events, TransportEvent::Connected);

                let reason = run_connection(stream, &config, &shared, &events, &mut shutdown).await;

                shared.disconnect();
                match &reason {
                    Disconnect::Shutdown => debug!(transport = %name, "transport closing"),
                    Disconnect::PeerClosed => info!(transport = %name, "peer closed connection"),
                    Disconnect::Failed(message) => {
                        warn!(transport = %name, error = %message, "connection failed");
                        emit(&events, TransportEvent::Error(message.clone()));
                    }
                }
                emit(&events, TransportEvent::Closed);

                if matches!(reason, Disconnect::Shutdown) {
                    break;
                }
            }
            Err(e) => {
                debug!(transport = %name, error = %e, "connect attempt failed");
                emit(&events, TransportEvent::Error(e.to_string()));
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    shared.disconnect();
    debug!(transport = %name, "transport loop stopped");
}

async fn run_connection(
    stream: TcpStream,
    config: &TcpTransportConfig,
    shared: &Shared,
    events: &mpsc::Sender<TransportEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> Disconnect {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; config.read_buffer.max(1)];

    loop {
        while let Some(bytes) = shared.dequeue() {
            if let Err(e) = writer.write_all(&bytes).await {
                return Disconnect::Failed(e.to_string());
            }
            shared.stats.sent_frames.fetch_add(1, Ordering::Relaxed);
            shared
                .stats
                .sent_bytes
                .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        }

        tokio::select! {
            _ = shutdown.changed() => {
                let _ = writer.shutdown().await;
                return Disconnect::Shutdown;
            }
            _ = shared.wake.notified() => {}
            read = reader.read(&mut buf) => match read {
                Ok(0) => return Disconnect::PeerClosed,
                Ok(n) => {
                    shared.stats.received_bytes.fetch_add(n as u64, Ordering::Relaxed);
                    emit(events, TransportEvent::BinaryReceived(Bytes::copy_from_slice(&buf[..n])));
                }
                Err(e) => return Disconnect::Failed(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    async fn next_event(events: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
        timeout(WAIT, events.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[test]
    fn test_config_from_params() {
        let params = HashMap::from([
            ("addr".to_string(), "127.0.0.1:7000".to_string()),
            ("reconnect_ms".to_string(), "250".to_string()),
            ("send_queue".to_string(), "8".to_string()),
        ]);
        let config = TcpTransportConfig::from_params(&params).unwrap();
        assert_eq!(config.addr.port(), 7000);
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.send_queue, 8);

        let err = TcpTransportConfig::from_params(&HashMap::new()).unwrap_err();
        assert!(matches!(err, TransportError::MissingParam("addr")));

        let params = HashMap::from([("addr".to_string(), "nowhere".to_string())]);
        assert!(TcpTransportConfig::from_params(&params).is_err());
    }

    #[test]
    fn test_queue_drops_oldest() {
        let shared = Shared::new(2);
        shared.connected.store(true, Ordering::Release);
        for byte in [1u8, 2, 3] {
            assert!(shared.enqueue(Bytes::from(vec![byte])));
        }
        assert_eq!(shared.stats.dropped_overflow(), 1);
        assert_eq!(shared.dequeue().unwrap()[0], 2);
        assert_eq!(shared.dequeue().unwrap()[0], 3);
        assert!(shared.dequeue().is_none());
    }

    #[test]
    fn test_frames_do_not_survive_a_disconnect() {
        let shared = Shared::new(4);
        shared.connected.store(true, Ordering::Release);
        assert!(shared.enqueue(Bytes::from_static(b"old")));

        shared.disconnect();
        assert!(!shared.enqueue(Bytes::from_static(b"late")));
        assert_eq!(shared.stats.dropped_disconnected(), 1);

        // next connection starts with an empty queue
        shared.connected.store(true, Ordering::Release);
        assert!(shared.dequeue().is_none());
    }

    #[tokio::test]
    async fn test_send_receive_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = TcpTransportConfig::new(addr).with_reconnect_delay(Duration::from_millis(50));
        let (transport, mut events) = TcpTransport::connect("tcp_test", config);

        let (mut peer, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        assert!(transport.is_connected());

        assert!(transport.send_binary(Bytes::from_static(b"frame-one")));
        let mut buf = [0u8; 9];
        timeout(WAIT, peer.read_exact(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf, b"frame-one");

        peer.write_all(b"hello").await.unwrap();
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::BinaryReceived(Bytes::from_static(b"hello"))
        );

        drop(peer);
        assert_eq!(next_event(&mut events).await, TransportEvent::Closed);
        assert_eq!(transport.stats().sent_frames(), 1);

        transport.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnected_sends_are_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = TcpTransportConfig::new(addr).with_reconnect_delay(Duration::from_millis(50));
        let (transport, mut events) = TcpTransport::connect("tcp_down", config);

        assert!(!transport.send_binary(Bytes::from_static(b"lost")));
        assert_eq!(transport.stats().dropped_disconnected(), 1);
        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Error(_)
        ));

        transport.shutdown().await;
    }
}
