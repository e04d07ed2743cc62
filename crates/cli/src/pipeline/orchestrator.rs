//! Pipeline orchestrator - coordinates all components.
//!
//! Owns the simulation step loop. Frames go to the dispatcher over a bounded
//! channel; bytes received by transport sinks are fed back into the
//! simulation's inbound queue.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::Bytes;
use contracts::{ScanFrame, SimBlueprint};
use dispatcher::{TransportEvent, TransportEvents};
use observability::{record_scan_metrics, record_scan_skipped, record_step_duration_ms};
use scan_engine::Simulation;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The simulation blueprint, overrides already applied
    pub blueprint: SimBlueprint,

    /// Maximum number of scans across all sensors (None = unlimited)
    pub max_scans: Option<u64>,

    /// Wall-clock timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Channel buffer size
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Why the step loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Duration,
    MaxScans,
    Timeout,
    Shutdown,
    DispatcherClosed,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline to completion
    pub async fn run(self) -> Result<PipelineStats> {
        self.run_until(std::future::pending()).await
    }

    /// Run until a stop condition is met or `shutdown` resolves.
    ///
    /// Sinks are flushed in both cases.
    pub async fn run_until<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let mut simulation =
            Simulation::from_blueprint(blueprint).context("Failed to build simulation")?;
        let active_sensors = simulation.sensors().iter().filter(|s| s.is_enabled()).count();

        for warning in config_loader::ConfigLoader::warnings(blueprint) {
            warn!(%warning, "Scan parameter clamped");
        }

        // Setup Dispatcher
        info!("Setting up dispatcher...");
        let buffer_size = self.config.buffer_size.max(1);
        let (scan_tx, scan_rx) = mpsc::channel::<ScanFrame>(buffer_size);

        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - scans will be dropped");
        }

        let mut dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), scan_rx)
            .await
            .context("Failed to create dispatcher")?;

        let active_sinks = dispatcher.sink_count();
        let sink_metrics = dispatcher.metrics_handles();

        let (inbound_tx, inbound_rx) = mpsc::channel::<Bytes>(buffer_size);
        let forwarders: Vec<_> = dispatcher
            .take_transport_events()
            .into_iter()
            .map(|events| spawn_event_forwarder(events, inbound_tx.clone()))
            .collect();
        drop(inbound_tx);
        simulation.attach_inbound(inbound_rx);

        let dispatcher_handle = dispatcher.spawn();
        info!(active_sinks, active_sensors, "Dispatcher started");

        let step_dt = blueprint.simulation.step_dt();
        let realtime = blueprint.simulation.realtime;
        let duration = blueprint.simulation.duration_sec;
        let deadline = self.config.timeout.map(|t| start_time + t);

        info!(
            step_hz = blueprint.simulation.step_hz,
            realtime,
            duration = ?duration,
            max_scans = ?self.config.max_scans,
            "Simulation running"
        );

        let mut stats = PipelineStats {
            active_sensors,
            active_sinks,
            ..Default::default()
        };

        let mut ticker = tokio::time::interval(Duration::from_secs_f64(step_dt));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = std::pin::pin!(shutdown);

        let reason = loop {
            if realtime {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break StopReason::Shutdown,
                    _ = ticker.tick() => {}
                }
            } else {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break StopReason::Shutdown,
                    _ = tokio::task::yield_now() => {}
                }
            }

            let step_start = Instant::now();
            let report = simulation.step(step_dt);
            stats.steps += 1;
            stats.sim_time = report.time;

            for bytes in &report.inbound {
                stats.inbound_messages += 1;
                stats.inbound_bytes += bytes.len() as u64;
            }
            if !report.inbound.is_empty() {
                debug!(messages = report.inbound.len(), "Inbound transport data drained");
            }

            for sensor_id in &report.skipped {
                record_scan_skipped(sensor_id);
                stats.scan_metrics.record_skipped(sensor_id);
            }

            let mut dispatcher_closed = false;
            for frame in report.frames {
                stats.scans += 1;
                record_scan_metrics(&frame);
                stats.scan_metrics.update(&frame);

                debug!(
                    sensor = %frame.sensor_id,
                    sequence = frame.sequence,
                    sim_time = format!("{:.4}", frame.sim_time),
                    hits = frame.hits,
                    "Scan produced"
                );

                match scan_tx.try_send(frame) {
                    Ok(()) => {}
                    Err(TrySendError::Full(frame)) => {
                        stats.scans_dropped += 1;
                        debug!(sensor = %frame.sensor_id, "Dispatcher channel full, scan dropped");
                    }
                    Err(TrySendError::Closed(_)) => {
                        dispatcher_closed = true;
                        break;
                    }
                }
            }
            record_step_duration_ms(step_start.elapsed().as_secs_f64() * 1000.0);

            if dispatcher_closed {
                break StopReason::DispatcherClosed;
            }
            if let Some(limit) = duration {
                if report.time >= limit - 1e-9 {
                    break StopReason::Duration;
                }
            }
            if let Some(max) = self.config.max_scans {
                if stats.scans >= max {
                    break StopReason::MaxScans;
                }
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break StopReason::Timeout;
            }
        };

        match reason {
            StopReason::Duration => info!(sim_time = stats.sim_time, "Reached simulated duration"),
            StopReason::MaxScans => info!(scans = stats.scans, "Reached max scans limit"),
            StopReason::Timeout => warn!(
                timeout_secs = self.config.timeout.map(|t| t.as_secs_f64()),
                "Pipeline timed out"
            ),
            StopReason::Shutdown => warn!("Received shutdown signal, stopping pipeline..."),
            StopReason::DispatcherClosed => warn!("Dispatcher channel closed"),
        }

        // Shutdown
        info!("Shutting down pipeline...");
        drop(scan_tx);

        // Wait for dispatcher to flush
        if tokio::time::timeout(Duration::from_secs(5), dispatcher_handle)
            .await
            .is_err()
        {
            warn!("Dispatcher did not finish within 5s");
        }
        for forwarder in forwarders {
            forwarder.abort();
        }

        stats.sink_metrics = sink_metrics
            .into_iter()
            .map(|(name, metrics)| (name, metrics.snapshot()))
            .collect();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            scans_per_sec = format!("{:.2}", stats.scans_per_sec()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Log transport lifecycle and forward received bytes to the simulation
fn spawn_event_forwarder(
    (sink, mut events): TransportEvents,
    inbound_tx: mpsc::Sender<Bytes>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Connected => {
                    info!(sink = %sink, "Transport connected");
                    observability::record_transport_event(&sink, "connected");
                }
                TransportEvent::Closed => {
                    info!(sink = %sink, "Transport closed");
                    observability::record_transport_event(&sink, "closed");
                }
                TransportEvent::Error(message) => {
                    warn!(sink = %sink, error = %message, "Transport error");
                    observability::record_transport_event(&sink, "error");
                }
                TransportEvent::BinaryReceived(bytes) => {
                    observability::record_transport_event(&sink, "binary_received");
                    if inbound_tx.try_send(bytes).is_err() {
                        debug!(sink = %sink, "Inbound queue full, message dropped");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    fn blueprint(extra: &str) -> SimBlueprint {
        let content = format!(
            r#"
[simulation]
step_hz = 100.0
realtime = false
{extra}

[[sensors]]
id = "front"
[sensors.scan]
field_of_view_deg = 180.0
scan_rate_hz = 10.0
measurement_rate_hz = 180.0

[[scene.obstacles]]
id = "wall"
shape = {{ kind = "box", half_extents = [0.1, 5.0, 1.0] }}
[scene.obstacles.transform.location]
x = 3.0
"#
        );
        ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap()
    }

    fn config(blueprint: SimBlueprint) -> PipelineConfig {
        PipelineConfig {
            blueprint,
            max_scans: None,
            timeout: None,
            buffer_size: 16,
            metrics_port: None,
        }
    }

    #[tokio::test]
    async fn test_runs_for_simulated_duration() {
        let stats = Pipeline::new(config(blueprint("duration_sec = 1.0")))
            .run()
            .await
            .unwrap();

        assert_eq!(stats.steps, 100);
        assert!((stats.sim_time - 1.0).abs() < 1e-6);
        // first scan on the first step, then at every 0.1s boundary
        assert_eq!(stats.scans, 11);
        assert_eq!(stats.active_sensors, 1);
        assert_eq!(stats.active_sinks, 0);
    }

    #[tokio::test]
    async fn test_stops_at_max_scans() {
        let mut cfg = config(blueprint(""));
        cfg.max_scans = Some(3);
        let stats = Pipeline::new(cfg).run().await.unwrap();
        assert_eq!(stats.scans, 3);
        assert_eq!(stats.scan_metrics.summary().sensors["front"].scans, 3);
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_loop() {
        let stats = Pipeline::new(config(blueprint("")))
            .run_until(async {})
            .await
            .unwrap();
        assert_eq!(stats.steps, 0);
    }

    #[tokio::test]
    async fn test_file_sink_receives_scans() {
        let dir = tempfile::tempdir().unwrap();
        let extra = format!(
            r#"duration_sec = 0.5

[[sinks]]
name = "recorder"
sink_type = "file"
[sinks.params]
base_path = "{}"
format = "jsonl"
"#,
            dir.path().display()
        );
        let stats = Pipeline::new(config(blueprint(&extra))).run().await.unwrap();

        assert_eq!(stats.scans, 6);
        let (name, snapshot) = &stats.sink_metrics[0];
        assert_eq!(name, "recorder");
        assert_eq!(snapshot.write_count, 6);

        let content = std::fs::read_to_string(dir.path().join("front.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 6);
    }
}
