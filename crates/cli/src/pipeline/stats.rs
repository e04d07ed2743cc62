//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::ScanMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Simulation steps executed
    pub steps: u64,

    /// Clock reading when the loop stopped (seconds)
    pub sim_time: f64,

    /// Scans produced by all sensors
    pub scans: u64,

    /// Scans dropped because the dispatcher channel was full
    pub scans_dropped: u64,

    /// Transport messages received and drained by the step loop
    pub inbound_messages: u64,
    pub inbound_bytes: u64,

    /// Wall-clock duration of the run
    pub duration: Duration,

    pub active_sensors: usize,
    pub active_sinks: usize,

    /// Per-sensor scan statistics
    pub scan_metrics: ScanMetricsAggregator,

    /// Final per-sink counters
    pub sink_metrics: Vec<(String, MetricsSnapshot)>,
}

impl PipelineStats {
    /// Scans per wall-clock second
    pub fn scans_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.scans as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Simulated seconds per wall-clock second
    pub fn real_time_factor(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.sim_time / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Simulation Statistics                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Wall time: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Sim time: {:.3}s ({} steps)", self.sim_time, self.steps);
        println!("   ├─ Real-time factor: {:.2}x", self.real_time_factor());
        println!("   ├─ Scans: {} ({:.2}/s)", self.scans, self.scans_per_sec());
        println!("   ├─ Scans dropped before dispatch: {}", self.scans_dropped);
        println!(
            "   ├─ Inbound: {} messages, {} bytes",
            self.inbound_messages, self.inbound_bytes
        );
        println!("   ├─ Active sensors: {}", self.active_sensors);
        println!("   └─ Active sinks: {}", self.active_sinks);

        let summary = self.scan_metrics.summary();

        println!("\n📈 Scan Metrics");
        println!("   ├─ Points: {}", summary.total_points);
        println!(
            "   ├─ Skipped (no environment): {} ({:.2}%)",
            summary.total_skipped, summary.skip_rate
        );
        println!("   └─ Scan interval (s): {}", summary.scan_interval_s);

        for (id, sensor) in &summary.sensors {
            println!("\n   📡 {}", id);
            println!("      ├─ Scans: {} (last #{})", sensor.scans, sensor.last_sequence);
            println!("      ├─ Hit ratio: {}", sensor.hit_ratio);
            println!("      └─ Nearest (m): {}", sensor.nearest_range_m);
        }

        if !self.sink_metrics.is_empty() {
            println!("\n📤 Sinks");
            for (name, m) in &self.sink_metrics {
                println!(
                    "   ├─ {}: written={} points={} failed={} dropped={}",
                    name, m.write_count, m.points_written, m.failure_count, m.dropped_count
                );
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let stats = PipelineStats {
            scans: 50,
            sim_time: 5.0,
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(stats.scans_per_sec(), 25.0);
        assert_eq!(stats.real_time_factor(), 2.5);
        assert_eq!(PipelineStats::default().scans_per_sec(), 0.0);
    }
}
