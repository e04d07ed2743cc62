//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info, warn};

use contracts::SimBlueprint;

use crate::cli::RunArgs;
use crate::error::{ensure_config_exists, CliError};
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    ensure_config_exists(&args.config)?;

    let loaded = config_loader::ConfigLoader::load_with_warnings(&args.config)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    for warning in &loaded.warnings {
        warn!(%warning, "Scan parameter will be clamped");
    }

    let mut blueprint = loaded.blueprint;
    apply_overrides(&mut blueprint, args)?;

    info!(
        sensors = blueprint.sensors.len(),
        obstacles = blueprint.scene.obstacles.len(),
        sinks = blueprint.sinks.len(),
        step_hz = blueprint.simulation.step_hz,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        max_scans: (args.max_scans > 0).then_some(args.max_scans),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    info!("Starting pipeline...");
    let stats = Pipeline::new(pipeline_config)
        .run_until(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        scans = stats.scans,
        scans_dropped = stats.scans_dropped,
        sim_time = stats.sim_time,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("lidar-sim finished");
    Ok(())
}

/// Fold command-line overrides into the blueprint
fn apply_overrides(blueprint: &mut SimBlueprint, args: &RunArgs) -> Result<(), CliError> {
    if let Some(duration) = args.duration {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(CliError::invalid_override("duration", "must be a positive number"));
        }
        info!(duration, "Overriding duration from CLI");
        blueprint.simulation.duration_sec = Some(duration);
    }
    if let Some(step_hz) = args.step_hz {
        if !(step_hz.is_finite() && step_hz > 0.0) {
            return Err(CliError::invalid_override("step-hz", "must be a positive number"));
        }
        info!(step_hz, "Overriding step frequency from CLI");
        blueprint.simulation.step_hz = step_hz;
    }
    if args.no_realtime {
        blueprint.simulation.realtime = false;
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &SimBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Simulation:");
    println!("  Step rate: {} Hz", blueprint.simulation.step_hz);
    match blueprint.simulation.duration_sec {
        Some(duration) => println!("  Duration: {duration}s"),
        None => println!("  Duration: unbounded"),
    }
    println!("  Realtime: {}", blueprint.simulation.realtime);

    println!("\nSensors ({}):", blueprint.sensors.len());
    for sensor in &blueprint.sensors {
        let scan = &sensor.scan;
        println!(
            "  - {}{} - {}° @ {} Hz, {} Hz measurements",
            sensor.id,
            if sensor.enabled { "" } else { " (disabled)" },
            scan.field_of_view_deg,
            scan.scan_rate_hz,
            scan.measurement_rate_hz
        );
    }

    println!("\nObstacles: {}", blueprint.scene.obstacles.len());

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
