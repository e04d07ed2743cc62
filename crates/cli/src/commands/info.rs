//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{ScanConfig, SensorConfig, SimBlueprint};
use scan_engine::ScanGeometry;

use crate::cli::InfoArgs;
use crate::error::ensure_config_exists;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    simulation: SimulationInfo,
    sensors: Vec<SensorInfo>,
    obstacle_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SimulationInfo {
    step_hz: f64,
    step_dt: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_sec: Option<f64>,
    realtime: bool,
}

/// Derived geometry for one sensor
#[derive(Serialize)]
struct SensorInfo {
    id: String,
    enabled: bool,
    geometry: ScanGeometry,
    rpm: f64,
    frame_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution_mismatch: Option<ResolutionMismatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    clamped: Vec<String>,
    /// Effective scan parameters, present with `--sensors`
    #[serde(skip_serializing_if = "Option::is_none")]
    scan: Option<ScanConfig>,
}

#[derive(Serialize)]
struct ResolutionMismatch {
    implied_points: usize,
    actual_points: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    addr: Option<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn sensor_info(sensor: &SensorConfig, with_scan: bool) -> SensorInfo {
    let (scan, adjustments) = sensor.scan.sanitized();
    let geometry = ScanGeometry::derive(&scan);

    SensorInfo {
        id: sensor.id.clone(),
        enabled: sensor.enabled,
        geometry,
        rpm: geometry.rpm(),
        frame_len: geometry.frame_len(),
        resolution_mismatch: geometry.resolution_mismatch().map(|(implied, actual)| {
            ResolutionMismatch {
                implied_points: implied,
                actual_points: actual,
            }
        }),
        clamped: adjustments.iter().map(ToString::to_string).collect(),
        scan: with_scan.then_some(scan),
    }
}

fn build_config_info(blueprint: &SimBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
                addr: s.params.get("addr").cloned(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        simulation: SimulationInfo {
            step_hz: blueprint.simulation.step_hz,
            step_dt: blueprint.simulation.step_dt(),
            duration_sec: blueprint.simulation.duration_sec,
            realtime: blueprint.simulation.realtime,
        },
        sensors: blueprint
            .sensors
            .iter()
            .map(|s| sensor_info(s, args.sensors))
            .collect(),
        obstacle_count: blueprint.scene.obstacles.len(),
        sinks,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                   lidar-sim Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⏱  Simulation");
    println!("   ├─ Version: {}", info.version);
    println!(
        "   ├─ Step: {} Hz ({:.4}s)",
        info.simulation.step_hz, info.simulation.step_dt
    );
    match info.simulation.duration_sec {
        Some(duration) => println!("   ├─ Duration: {duration}s"),
        None => println!("   ├─ Duration: unbounded"),
    }
    println!("   ├─ Realtime: {}", info.simulation.realtime);
    println!("   └─ Obstacles: {}", info.obstacle_count);

    println!("\n📡 Sensors ({})", info.sensors.len());
    for (i, sensor) in info.sensors.iter().enumerate() {
        let is_last = i == info.sensors.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child = if is_last { "   " } else { "│  " };
        let g = &sensor.geometry;

        println!(
            "   {} {}{}",
            prefix,
            sensor.id,
            if sensor.enabled { "" } else { " (disabled)" }
        );
        println!("   {}  ├─ Points per scan: {}", child, g.point_count);
        println!(
            "   {}  ├─ Angles: [{:.6}, {:.6}] rad, increment {:.6} ({:?})",
            child, g.angle_min, g.angle_max, g.angle_increment, g.convention
        );
        println!(
            "   {}  ├─ Scan time: {:.6}s, time increment {:.9}s",
            child, g.scan_time, g.time_increment
        );
        println!("   {}  ├─ Rotation: {:.1} rpm", child, sensor.rpm);
        if let Some(ref mismatch) = sensor.resolution_mismatch {
            println!(
                "   {}  ├─ ⚠ resolution implies {} points, using {}",
                child, mismatch.implied_points, mismatch.actual_points
            );
        }
        for clamped in &sensor.clamped {
            println!("   {}  ├─ ⚠ clamped {}", child, clamped);
        }
        if let Some(ref scan) = sensor.scan {
            println!(
                "   {}  ├─ Range: [{}, {}] m, noise σ {} (seed {})",
                child, scan.min_range, scan.max_range, scan.noise_std_dev, scan.noise_seed
            );
            println!(
                "   {}  ├─ Frame: {}, {:?}, offset {}°",
                child, scan.frame_id, scan.rotation_direction, scan.angle_offset_deg
            );
        }
        println!("   {}  └─ Wire frame: {} bytes", child, sensor.frame_len);
    }

    if !info.sinks.is_empty() {
        println!("\n📤 Sinks ({})", info.sinks.len());
        for (i, sink) in info.sinks.iter().enumerate() {
            let is_last = i == info.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            match sink.addr {
                Some(ref addr) => println!(
                    "   {} {} ({}, queue {}) → {}",
                    prefix, sink.name, sink.sink_type, sink.queue_capacity, addr
                ),
                None => println!(
                    "   {} {} ({}, queue {})",
                    prefix, sink.name, sink.sink_type, sink.queue_capacity
                ),
            }
        }
    }

    println!();
}
