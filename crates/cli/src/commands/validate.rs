//! `lidar-sim validate`: load a blueprint, report what is wrong or will be clamped.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::SimBlueprint;

use crate::cli::ValidateArgs;

#[derive(Serialize)]
struct ValidationReport {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<BlueprintCounts>,
}

#[derive(Serialize)]
struct BlueprintCounts {
    version: String,
    step_hz: f64,
    sensor_count: usize,
    enabled_sensor_count: usize,
    obstacle_count: usize,
    sink_count: usize,
}

impl ValidationReport {
    fn rejected(path: &Path, error: String) -> Self {
        Self {
            valid: false,
            config_path: path.display().to_string(),
            error: Some(error),
            warnings: Vec::new(),
            summary: None,
        }
    }

    fn accepted(path: &Path, blueprint: &SimBlueprint) -> Self {
        Self {
            valid: true,
            config_path: path.display().to_string(),
            error: None,
            warnings: collect_warnings(blueprint),
            summary: Some(BlueprintCounts {
                version: format!("{:?}", blueprint.version),
                step_hz: blueprint.simulation.step_hz,
                sensor_count: blueprint.sensors.len(),
                enabled_sensor_count: blueprint.enabled_sensors().count(),
                obstacle_count: blueprint.scene.obstacles.len(),
                sink_count: blueprint.sinks.len(),
            }),
        }
    }
}

pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating blueprint");

    let report = validate_config(&args.config);

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize validation report")?;
        println!("{json}");
    } else {
        print_report(&report);
    }

    anyhow::ensure!(report.valid, "{} is not a usable blueprint", report.config_path);
    Ok(())
}

fn validate_config(path: &Path) -> ValidationReport {
    if !path.exists() {
        return ValidationReport::rejected(path, format!("File not found: {}", path.display()));
    }

    match config_loader::ConfigLoader::load_from_path(path) {
        Ok(blueprint) => ValidationReport::accepted(path, &blueprint),
        Err(e) => ValidationReport::rejected(path, e.to_string()),
    }
}

/// Non-fatal findings: clamped scan parameters and a pipeline that would produce nothing
fn collect_warnings(blueprint: &SimBlueprint) -> Vec<String> {
    let mut warnings: Vec<String> = config_loader::ConfigLoader::warnings(blueprint)
        .iter()
        .map(|w| format!("{w} (clamped)"))
        .collect();

    let checks = [
        (blueprint.sinks.is_empty(), "No sinks configured - scans will be dropped"),
        (
            blueprint.enabled_sensors().next().is_none(),
            "No enabled sensors - no scans will be produced",
        ),
        (
            blueprint.scene.obstacles.is_empty(),
            "Scene has no obstacles - every ray will miss",
        ),
    ];
    warnings.extend(
        checks
            .into_iter()
            .filter(|(hit, _)| *hit)
            .map(|(_, message)| message.to_string()),
    );

    warnings
}

fn print_report(report: &ValidationReport) {
    if !report.valid {
        println!("✗ {} rejected", report.config_path);
        if let Some(error) = &report.error {
            println!("    {error}");
        }
        return;
    }

    println!("✓ {} ok", report.config_path);
    if let Some(counts) = &report.summary {
        println!(
            "    {:?} blueprint, stepping at {} Hz",
            counts.version, counts.step_hz
        );
        println!(
            "    {} sensors ({} enabled), {} obstacles, {} sinks",
            counts.sensor_count,
            counts.enabled_sensor_count,
            counts.obstacle_count,
            counts.sink_count
        );
    }

    if !report.warnings.is_empty() {
        println!("\n⚠ {} warning(s)", report.warnings.len());
        for warning in &report.warnings {
            println!("    - {warning}");
        }
    }
}
