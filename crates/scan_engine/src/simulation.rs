//! Simulation step loop
//!
//! Owns the one authoritative clock. Each `step(dt)` advances it exactly
//! once, drains inbound transport bytes, then steps every sensor, so all
//! sensors in a step read the same `now()`.

use std::sync::Arc;

use bytes::Bytes;
use contracts::{ContractError, ScanFrame, SensorId, SimBlueprint};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::clock::{ClockHandle, SimulationClock};
use crate::environment::RayCastEnvironment;
use crate::scene::{pose_from_transform, Scene};
use crate::sensor::{LidarSensor, StepOutcome};

/// What happened during one step
#[derive(Debug, Default)]
pub struct StepReport {
    /// Clock reading after the advance
    pub time: f64,
    pub frames: Vec<ScanFrame>,
    /// Bytes received from the transport since the previous step
    pub inbound: Vec<Bytes>,
    /// Sensors whose scan was due but had no environment
    pub skipped: Vec<SensorId>,
}

pub struct Simulation {
    clock: SimulationClock,
    sensors: Vec<LidarSensor>,
    environment: Option<Arc<dyn RayCastEnvironment>>,
    inbound: Option<mpsc::Receiver<Bytes>>,
    steps: u64,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("clock", &self.clock)
            .field("sensors", &self.sensors)
            .field("has_environment", &self.environment.is_some())
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self::with_clock(SimulationClock::new())
    }

    pub fn with_clock(clock: SimulationClock) -> Self {
        Self {
            clock,
            sensors: Vec::new(),
            environment: None,
            inbound: None,
            steps: 0,
        }
    }

    /// Build sensors and scene from a loaded blueprint
    pub fn from_blueprint(blueprint: &SimBlueprint) -> Result<Self, ContractError> {
        let mut simulation = Self::new();
        let scene = Scene::from_config(&blueprint.scene)?;
        info!(
            obstacles = scene.len(),
            sensors = blueprint.sensors.len(),
            "building simulation"
        );
        simulation.set_environment(Arc::new(scene));

        for sensor_config in &blueprint.sensors {
            let mut sensor = LidarSensor::new(
                sensor_config.id.as_str(),
                sensor_config.scan.clone(),
                simulation.clock(),
            );
            sensor.set_pose(pose_from_transform(&sensor_config.mount));
            sensor.set_enabled(sensor_config.enabled);
            simulation.add_sensor(sensor)?;
        }
        Ok(simulation)
    }

    /// Read-only handle to the authoritative clock
    pub fn clock(&self) -> ClockHandle {
        self.clock.handle()
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Check a clock against the authoritative one.
    ///
    /// A simulation keeps its first clock: any other is reported with
    /// `warn!` and `false` is returned, leaving this simulation's time untouched.
    pub fn attach_clock(&self, other: &ClockHandle) -> bool {
        if self.clock.handle().same_clock(other) {
            return true;
        }
        warn!(
            active_clock = self.clock.id(),
            ignored_clock = other.clock_id(),
            "second simulation clock ignored"
        );
        false
    }

    /// Register a sensor.
    ///
    /// A sensor built against a different clock is rebound to this one. The
    /// shared environment is bound when the sensor has none.
    pub fn add_sensor(&mut self, mut sensor: LidarSensor) -> Result<(), ContractError> {
        if self.sensors.iter().any(|s| s.id() == sensor.id()) {
            return Err(ContractError::config_validation(
                "sensors.id",
                format!("duplicate sensor id '{}'", sensor.id()),
            ));
        }

        if !self.attach_clock(sensor.clock()) {
            debug!(sensor_id = %sensor.id(), "rebinding sensor to the simulation clock");
            sensor.rebind_clock(self.clock.handle());
        }

        if !sensor.has_environment() {
            if let Some(environment) = &self.environment {
                sensor.bind_environment(Arc::clone(environment));
            }
        }

        debug!(sensor_id = %sensor.id(), points = sensor.geometry().point_count, "sensor added");
        self.sensors.push(sensor);
        Ok(())
    }

    pub fn remove_sensor(&mut self, id: &str) -> Option<LidarSensor> {
        let index = self.sensors.iter().position(|s| s.id() == id)?;
        Some(self.sensors.remove(index))
    }

    /// Bind one environment to every current and future sensor
    pub fn set_environment(&mut self, environment: Arc<dyn RayCastEnvironment>) {
        for sensor in &mut self.sensors {
            sensor.bind_environment(Arc::clone(&environment));
        }
        self.environment = Some(environment);
    }

    /// Queue drained at the start of every step
    pub fn attach_inbound(&mut self, receiver: mpsc::Receiver<Bytes>) {
        self.inbound = Some(receiver);
    }

    pub fn sensors(&self) -> &[LidarSensor] {
        &self.sensors
    }

    pub fn sensor(&self, id: &str) -> Option<&LidarSensor> {
        self.sensors.iter().find(|s| s.id() == id)
    }

    pub fn sensor_mut(&mut self, id: &str) -> Option<&mut LidarSensor> {
        self.sensors.iter_mut().find(|s| s.id() == id)
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Advance the clock by `dt` and run every sensor once.
    pub fn step(&mut self, dt: f64) -> StepReport {
        let time = self.clock.advance(dt);
        self.steps += 1;

        let mut report = StepReport {
            time,
            ..Default::default()
        };

        if let Some(receiver) = self.inbound.as_mut() {
            while let Ok(bytes) = receiver.try_recv() {
                report.inbound.push(bytes);
            }
        }

        for sensor in &mut self.sensors {
            match sensor.step() {
                StepOutcome::Scanned(frame) => report.frames.push(frame),
                StepOutcome::EnvironmentUnavailable => report.skipped.push(sensor.id().clone()),
                StepOutcome::Idle | StepOutcome::Disabled => {}
            }
        }

        metrics::gauge!("sim_time_seconds").set(time);
        report
    }

    /// Restart the experiment at time zero
    pub fn reset(&mut self) {
        self.clock.reset();
        self.steps = 0;
    }
}
