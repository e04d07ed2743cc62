//! Fan-out loop: one input channel of scans, one bounded queue per sink.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{ScanFrame, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::SinkMetrics;
use crate::sinks::{FileSink, LogSink, TransportSink, UdpSink};
use crate::transport::{TcpTransport, TransportEvent};

/// Event stream of a transport-backed sink, keyed by sink name
pub type TransportEvents = (String, mpsc::Receiver<TransportEvent>);

const PROGRESS_EVERY: u64 = 100;

/// Open every configured sink and wire it to `input_rx`.
///
/// Fails on the first sink whose parameters are unusable; sinks already
/// started are dropped along with their queues.
#[instrument(name = "dispatcher_create", skip_all, fields(sinks = sink_configs.len()))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<ScanFrame>,
) -> Result<Dispatcher, DispatcherError> {
    let mut dispatcher = Dispatcher::with_handles(Vec::with_capacity(sink_configs.len()), input_rx);

    for config in &sink_configs {
        let (handle, events) = open_sink(config).await?;
        dispatcher.handles.push(handle);
        if let Some(events) = events {
            dispatcher.transport_events.push((config.name.clone(), events));
        }
    }

    Ok(dispatcher)
}

#[instrument(
    name = "dispatcher_open_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn open_sink(
    config: &SinkConfig,
) -> Result<(SinkHandle, Option<mpsc::Receiver<TransportEvent>>), DispatcherError> {
    let sink_error = |e| DispatcherError::sink_creation(&config.name, e);
    let capacity = config.queue_capacity;

    let opened = match config.sink_type {
        SinkType::Log => (SinkHandle::spawn(LogSink::new(&config.name), capacity), None),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params).map_err(sink_error)?;
            (SinkHandle::spawn(sink, capacity), None)
        }
        SinkType::Udp => {
            let sink = UdpSink::from_params(&config.name, &config.params)
                .await
                .map_err(sink_error)?;
            (SinkHandle::spawn(sink, capacity), None)
        }
        SinkType::Tcp => {
            let (sink, events) =
                TransportSink::<TcpTransport>::tcp_from_params(&config.name, &config.params)
                    .map_err(sink_error)?;
            (SinkHandle::spawn(sink, capacity), Some(events))
        }
    };

    debug!("Sink opened");
    Ok(opened)
}

/// Copies every incoming scan into each sink's queue
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<ScanFrame>,
    transport_events: Vec<TransportEvents>,
}

impl Dispatcher {
    /// Assemble from already running sink handles
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<ScanFrame>) -> Self {
        Self {
            handles,
            input_rx,
            transport_events: Vec::new(),
        }
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Per-sink counters; they stay live after [`Dispatcher::spawn`]
    pub fn metrics_handles(&self) -> Vec<(String, Arc<SinkMetrics>)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect()
    }

    /// Event channels of transport-backed sinks. A second call returns nothing.
    pub fn take_transport_events(&mut self) -> Vec<TransportEvents> {
        std::mem::take(&mut self.transport_events)
    }

    /// Forward scans until every sender of the input channel is gone,
    /// then drain and close each sink in turn.
    #[instrument(name = "dispatcher_run", skip(self), fields(sinks = self.handles.len()))]
    pub async fn run(mut self) {
        info!("Dispatching scans");

        let mut forwarded: u64 = 0;
        while let Some(frame) = self.input_rx.recv().await {
            self.fan_out(frame);
            forwarded += 1;
            if forwarded.is_multiple_of(PROGRESS_EVERY) {
                debug!(scans = forwarded, "Dispatch progress");
            }
        }

        info!(scans = forwarded, "Scan input closed, draining sinks");
        for handle in self.handles {
            handle.shutdown().await;
        }
        info!("All sinks drained");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    fn fan_out(&self, frame: ScanFrame) {
        ::metrics::counter!("dispatcher_frames_total").increment(1);
        for handle in &self.handles {
            // ScanFrame shares its message behind an Arc
            if !handle.try_send(frame.clone()) {
                ::metrics::counter!(
                    "dispatcher_frames_dropped_total",
                    "sink" => handle.name().to_string()
                )
                .increment(1);
            }
        }
    }
}
