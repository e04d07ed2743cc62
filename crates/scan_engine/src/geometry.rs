//! Sampling geometry and timing derived from a `ScanConfig`

use contracts::{frame_len, AngleConvention, ScanConfig};
use serde::Serialize;

/// Derived scan layout.
///
/// Built from a sanitized config, so `point_count >= 1` and every rate is
/// positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanGeometry {
    pub point_count: usize,
    pub convention: AngleConvention,
    /// Message-frame angles (radians)
    pub angle_min: f64,
    pub angle_max: f64,
    pub angle_increment: f64,
    /// Full rotation period (seconds)
    pub scan_time: f64,
    /// `scan_time / point_count`
    pub time_increment: f64,
    /// Cross-check value from `resolution_deg`, never applied
    pub implied_points_from_resolution: Option<usize>,
    rotation_sign: f64,
    angle_offset: f64,
}

impl ScanGeometry {
    pub fn derive(config: &ScanConfig) -> Self {
        let point_count = match config.points_per_scan {
            Some(points) => points as usize,
            None => (config.measurement_rate_hz / config.scan_rate_hz).round() as usize,
        }
        .max(1);

        let (angle_min, angle_max, angle_increment, span_deg) = match config.angle_range {
            None => {
                let fov = config.field_of_view_deg.to_radians();
                let increment = fov / point_count as f64;
                let min = -fov / 2.0;
                (
                    min,
                    min + increment * (point_count - 1) as f64,
                    increment,
                    config.field_of_view_deg,
                )
            }
            Some(range) => {
                let span = range.max_rad - range.min_rad;
                if point_count > 1 {
                    (
                        range.min_rad,
                        range.max_rad,
                        span / (point_count - 1) as f64,
                        span.to_degrees(),
                    )
                } else {
                    (range.min_rad, range.min_rad, 0.0, span.to_degrees())
                }
            }
        };

        let scan_time = 1.0 / config.scan_rate_hz;
        let implied_points_from_resolution = config
            .resolution_deg
            .map(|resolution| (span_deg / resolution).round().max(1.0) as usize);

        Self {
            point_count,
            convention: config.angle_convention(),
            angle_min,
            angle_max,
            angle_increment,
            scan_time,
            time_increment: scan_time / point_count as f64,
            implied_points_from_resolution,
            rotation_sign: config.rotation_direction.sign(),
            angle_offset: config.angle_offset_deg.to_radians(),
        }
    }

    /// Message-frame angle of sample `index`
    #[inline]
    pub fn angle_at(&self, index: usize) -> f64 {
        self.angle_min + index as f64 * self.angle_increment
    }

    /// Physical ray yaw for sample `index`, in the sensor frame
    #[inline]
    pub fn effective_angle(&self, index: usize) -> f64 {
        self.rotation_sign * self.angle_at(index) + self.angle_offset
    }

    /// Angle swept during one rotation period (radians)
    pub fn sweep(&self) -> f64 {
        match self.convention {
            AngleConvention::FovCentered => self.angle_increment * self.point_count as f64,
            AngleConvention::ExplicitRange => self.angle_max - self.angle_min,
        }
    }

    /// Revolutions per minute
    pub fn rpm(&self) -> f64 {
        60.0 / self.scan_time
    }

    /// Encoded wire frame size in bytes
    pub fn frame_len(&self) -> usize {
        frame_len(self.point_count)
    }

    /// `(implied, actual)` when the resolution cross-check disagrees
    pub fn resolution_mismatch(&self) -> Option<(usize, usize)> {
        self.implied_points_from_resolution
            .filter(|&implied| implied != self.point_count)
            .map(|implied| (implied, self.point_count))
    }
}
