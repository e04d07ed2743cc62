//! LidarSensor - rotating 2D range sensor
//!
//! Produces one full-rotation `ScanMessage` every `1 / scan_rate_hz` seconds
//! of simulation time. Everything runs inside `step()`; there is no
//! internal threading apart from the optional rayon ray fan-out.

use std::sync::Arc;
use std::time::Instant;

use contracts::{
    ConfigAdjustment, NoReturnPolicy, ScanConfig, ScanFrame, ScanHeader, ScanMessage, ScanSample,
    SensorId, Stamp,
};
use rayon::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::clock::ClockHandle;
use crate::environment::{QueryFilter, RayCastEnvironment};
use crate::geometry::ScanGeometry;
use crate::na::{Isometry3, Point3, Unit, Vector3};
use crate::noise::RangeNoise;

/// Float slack when comparing accumulated step time against the cadence
const CADENCE_EPSILON: f64 = 1e-9;

/// Result of one `LidarSensor::step`
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Not yet time for the next scan
    Idle,
    Disabled,
    /// Scan was due but no ray-query backend is bound
    EnvironmentUnavailable,
    Scanned(ScanFrame),
}

impl StepOutcome {
    pub fn frame(&self) -> Option<&ScanFrame> {
        match self {
            Self::Scanned(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Per-sensor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorStats {
    pub scans: u64,
    pub skipped_no_environment: u64,
    pub notifications_dropped: u64,
}

pub struct LidarSensor {
    id: SensorId,
    config: ScanConfig,
    geometry: ScanGeometry,
    clock: ClockHandle,
    clock_epoch: u64,
    environment: Option<Arc<dyn RayCastEnvironment>>,
    pose: Isometry3<f32>,
    enabled: bool,
    next_scan_time: f64,
    last_scan_start: Option<f64>,
    sequence: u64,
    noise: RangeNoise,
    last_scan: Option<Arc<ScanMessage>>,
    last_samples: Vec<ScanSample>,
    subscribers: Vec<mpsc::Sender<ScanFrame>>,
    stats: SensorStats,
}

impl std::fmt::Debug for LidarSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LidarSensor")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .field("geometry", &self.geometry)
            .field("has_environment", &self.environment.is_some())
            .field("next_scan_time", &self.next_scan_time)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

impl LidarSensor {
    /// Create an enabled sensor at the world origin with no environment bound.
    ///
    /// Out-of-range config values are clamped and logged.
    pub fn new(id: impl Into<SensorId>, config: ScanConfig, clock: ClockHandle) -> Self {
        let id = id.into();
        let (config, adjustments) = config.sanitized();
        log_adjustments(&id, &adjustments);

        let geometry = ScanGeometry::derive(&config);
        log_resolution_check(&id, &geometry);

        let noise = RangeNoise::new(config.noise_std_dev, config.noise_seed);
        let next_scan_time = clock.now();
        let clock_epoch = clock.epoch();

        Self {
            id,
            config,
            geometry,
            clock,
            clock_epoch,
            environment: None,
            pose: Isometry3::identity(),
            enabled: true,
            next_scan_time,
            last_scan_start: None,
            sequence: 0,
            noise,
            last_scan: None,
            last_samples: Vec::new(),
            subscribers: Vec::new(),
            stats: SensorStats::default(),
        }
    }

    pub fn id(&self) -> &SensorId {
        &self.id
    }

    /// Active (sanitized) config
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn geometry(&self) -> &ScanGeometry {
        &self.geometry
    }

    pub fn clock(&self) -> &ClockHandle {
        &self.clock
    }

    pub fn stats(&self) -> SensorStats {
        self.stats
    }

    /// Number of scans produced so far
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Replace the config between cycles.
    ///
    /// Already published scans are unaffected. Returns the clamps applied.
    pub fn update_config(&mut self, config: ScanConfig) -> Vec<ConfigAdjustment> {
        let (config, adjustments) = config.sanitized();
        log_adjustments(&self.id, &adjustments);

        self.geometry = ScanGeometry::derive(&config);
        log_resolution_check(&self.id, &self.geometry);

        if !self.noise.matches(config.noise_std_dev, config.noise_seed) {
            self.noise = RangeNoise::new(config.noise_std_dev, config.noise_seed);
        }
        self.config = config;
        adjustments
    }

    pub fn bind_environment(&mut self, environment: Arc<dyn RayCastEnvironment>) {
        self.environment = Some(environment);
    }

    pub fn unbind_environment(&mut self) {
        self.environment = None;
    }

    pub fn has_environment(&self) -> bool {
        self.environment.is_some()
    }

    /// World pose of the sensor origin; the rotor spins about its local Z
    pub fn set_pose(&mut self, pose: Isometry3<f32>) {
        self.pose = pose;
    }

    pub fn pose(&self) -> &Isometry3<f32> {
        &self.pose
    }

    /// Disabling halts the cadence; enabling restarts it from the current time
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.next_scan_time = self.clock.now();
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Point the sensor at another clock and restart its cadence there
    pub fn rebind_clock(&mut self, clock: ClockHandle) {
        self.next_scan_time = clock.now();
        self.clock_epoch = clock.epoch();
        self.last_scan_start = None;
        self.clock = clock;
    }

    /// Bounded push channel for published frames.
    ///
    /// Frames are offered with `try_send`; a full channel drops the frame.
    pub fn subscribe(&mut self, capacity: usize) -> mpsc::Receiver<ScanFrame> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribers.push(tx);
        rx
    }

    pub fn last_scan(&self) -> Option<Arc<ScanMessage>> {
        self.last_scan.clone()
    }

    /// Per-sample view of the last scan, including hit flags
    pub fn last_samples(&self) -> &[ScanSample] {
        &self.last_samples
    }

    pub fn rpm(&self) -> f64 {
        self.geometry.rpm()
    }

    /// Message-frame angle the rotor currently points at, if it has scanned
    pub fn current_angle(&self) -> Option<f64> {
        let start = self.last_scan_start?;
        let phase = ((self.clock.now() - start) / self.geometry.scan_time).rem_euclid(1.0);
        Some(self.geometry.angle_min + phase * self.geometry.sweep())
    }

    /// Run the cadence check and synthesize a scan when one is due.
    pub fn step(&mut self) -> StepOutcome {
        if !self.enabled {
            return StepOutcome::Disabled;
        }

        let epoch = self.clock.epoch();
        if epoch != self.clock_epoch {
            self.clock_epoch = epoch;
            self.next_scan_time = self.clock.now();
            self.last_scan_start = None;
            debug!(sensor_id = %self.id, epoch, "clock reset, cadence restarted");
        }

        let now = self.clock.now();
        if now + CADENCE_EPSILON < self.next_scan_time {
            return StepOutcome::Idle;
        }

        let Some(environment) = self.environment.clone() else {
            self.stats.skipped_no_environment += 1;
            metrics::counter!(
                "lidar_scans_skipped_total",
                "sensor_id" => self.id.to_string(),
                "reason" => "no_environment"
            )
            .increment(1);
            debug!(sensor_id = %self.id, now, "no ray-cast environment bound, skipping scan");
            return StepOutcome::EnvironmentUnavailable;
        };

        let scan_time = self.geometry.scan_time;
        if now - self.next_scan_time >= scan_time {
            debug!(
                sensor_id = %self.id,
                behind = now - self.next_scan_time,
                "cadence re-anchored"
            );
            self.next_scan_time = now + scan_time;
        } else {
            self.next_scan_time += scan_time;
        }

        let frame = self.synthesize(now, environment.as_ref());
        self.publish(&frame);
        StepOutcome::Scanned(frame)
    }

    fn synthesize(&mut self, scan_start: f64, environment: &dyn RayCastEnvironment) -> ScanFrame {
        let started = Instant::now();
        let geometry = self.geometry;
        let n = geometry.point_count;

        let caster = RayCaster {
            environment,
            geometry: &geometry,
            pose: &self.pose,
            filter: QueryFilter::new(self.config.obstacle_mask).excluding(self.id.clone()),
            start_offset: self.config.ray_start_offset,
            min_range: self.config.min_range,
            max_range: self.config.max_range,
            miss_range: match self.config.no_return {
                NoReturnPolicy::Infinity => f32::INFINITY,
                NoReturnPolicy::RangeMax => self.config.max_range,
            },
        };

        // Ordered collect keeps index order regardless of execution order
        let raw: Vec<(f32, bool)> = if self.config.parallel_rays {
            (0..n).into_par_iter().map(|i| caster.cast(i)).collect()
        } else {
            (0..n).map(|i| caster.cast(i)).collect()
        };

        let mut ranges = Vec::with_capacity(n);
        let mut samples = Vec::with_capacity(n);
        let mut hits = 0u32;
        for (index, (range, hit)) in raw.into_iter().enumerate() {
            let range = self
                .noise
                .perturb(range, self.config.min_range, self.config.max_range);
            hits += hit as u32;
            ranges.push(range);
            samples.push(ScanSample {
                angle: geometry.angle_at(index) as f32,
                range,
                intensity: 0.0,
                hit,
            });
        }

        let scan = Arc::new(ScanMessage {
            header: ScanHeader {
                stamp: Stamp::from_seconds(scan_start),
                frame_id: self.config.frame_id.clone(),
            },
            angle_min: geometry.angle_min as f32,
            angle_max: geometry.angle_max as f32,
            angle_increment: geometry.angle_increment as f32,
            time_increment: geometry.time_increment as f32,
            scan_time: geometry.scan_time as f32,
            range_min: self.config.min_range,
            range_max: self.config.max_range,
            intensities: vec![0.0; ranges.len()],
            ranges,
        });

        self.sequence += 1;
        self.stats.scans += 1;
        self.last_scan_start = Some(scan_start);
        self.last_scan = Some(Arc::clone(&scan));
        self.last_samples = samples;

        metrics::counter!("lidar_scans_total", "sensor_id" => self.id.to_string()).increment(1);
        metrics::histogram!("lidar_scan_synthesis_seconds", "sensor_id" => self.id.to_string())
            .record(started.elapsed().as_secs_f64());

        ScanFrame {
            sensor_id: self.id.clone(),
            sequence: self.sequence,
            sim_time: scan_start,
            hits,
            encode_options: self.config.encode_options(),
            scan,
        }
    }

    fn publish(&mut self, frame: &ScanFrame) {
        let id = &self.id;
        let stats = &mut self.stats;
        self.subscribers.retain(|tx| match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                stats.notifications_dropped += 1;
                warn!(sensor_id = %id, sequence = frame.sequence, "subscriber full, scan dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(sensor_id = %id, "subscriber closed");
                false
            }
        });
    }
}

/// Immutable per-scan state shared by all ray casts
struct RayCaster<'a> {
    environment: &'a dyn RayCastEnvironment,
    geometry: &'a ScanGeometry,
    pose: &'a Isometry3<f32>,
    filter: QueryFilter,
    start_offset: f32,
    min_range: f32,
    max_range: f32,
    miss_range: f32,
}

impl RayCaster<'_> {
    fn cast(&self, index: usize) -> (f32, bool) {
        let yaw = self.geometry.effective_angle(index) as f32;
        let local = Vector3::new(yaw.cos(), yaw.sin(), 0.0);
        let direction = Unit::new_normalize(self.pose.rotation * local);
        let origin = Point3::from(self.pose.translation.vector) + direction.into_inner() * self.start_offset;

        match self
            .environment
            .cast_ray(&origin, &direction, self.max_range, &self.filter)
        {
            Some(hit) => (
                (hit.distance + self.start_offset).clamp(self.min_range, self.max_range),
                true,
            ),
            None => (self.miss_range, false),
        }
    }
}

fn log_adjustments(id: &SensorId, adjustments: &[ConfigAdjustment]) {
    for adjustment in adjustments {
        warn!(
            sensor_id = %id,
            field = adjustment.field,
            original = %adjustment.original,
            applied = %adjustment.applied,
            "scan config value out of range, clamped"
        );
    }
}

fn log_resolution_check(id: &SensorId, geometry: &ScanGeometry) {
    if let Some((implied, actual)) = geometry.resolution_mismatch() {
        debug!(
            sensor_id = %id,
            implied,
            actual,
            "resolution implies a different point count, keeping rate-derived count"
        );
    }
}
