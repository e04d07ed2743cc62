//! ScanConfig - hardware-like LiDAR parameters
//!
//! Out-of-range values are never rejected. `ScanConfig::sanitized` pulls each
//! field back to the nearest valid value and reports what it changed, so the
//! synthesizer can never divide by zero or emit an empty scan.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::wire::EncodeOptions;

/// Lowest accepted rotation rate (Hz)
pub const MIN_SCAN_RATE_HZ: f64 = 0.01;
/// Lowest accepted measurement rate (samples per second)
pub const MIN_MEASUREMENT_RATE_HZ: f64 = 1.0;
/// Narrowest accepted field of view (degrees)
pub const MIN_FOV_DEG: f64 = 0.01;
/// Widest accepted field of view (degrees)
pub const MAX_FOV_DEG: f64 = 360.0;
/// Upper bound on samples per scan, from either derivation
pub const MAX_POINTS_PER_SCAN: u32 = 1_000_000;

/// Physical spin direction of the rotor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationDirection {
    /// Clockwise seen from above
    Cw,
    /// Counter-clockwise seen from above (ROS convention)
    #[default]
    Ccw,
}

impl RotationDirection {
    /// Sign applied to message-frame angles to get the device angle
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Self::Cw => -1.0,
            Self::Ccw => 1.0,
        }
    }
}

/// Explicit ROS `angle_min` / `angle_max` pair (radians)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    pub min_rad: f64,
    pub max_rad: f64,
}

/// Which angle derivation is in effect for a config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleConvention {
    /// `angle_min = -FOV/2`, `angle_increment = FOV/n`
    FovCentered,
    /// `angle_min`/`angle_max` supplied, `angle_increment = span/(n-1)`
    ExplicitRange,
}

/// What a ray that hits nothing reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoReturnPolicy {
    /// `+inf`, the ROS "no return" sentinel
    #[default]
    Infinity,
    /// `range_max`, for consumers that cannot handle non-finite values
    RangeMax,
}

/// LiDAR scan configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Angular span covered by one scan (degrees)
    pub field_of_view_deg: f64,

    /// Rotations per second
    pub scan_rate_hz: f64,

    /// Samples per second
    pub measurement_rate_hz: f64,

    /// Minimum valid range (meters)
    pub min_range: f32,

    /// Maximum valid range (meters)
    pub max_range: f32,

    /// Fixed mounting yaw applied to every ray (degrees)
    pub angle_offset_deg: f64,

    pub rotation_direction: RotationDirection,

    /// Gaussian range noise standard deviation (meters), 0 disables noise
    pub noise_std_dev: f32,

    /// Noise generator seed, 0 = seeded from the wall clock
    pub noise_seed: u64,

    /// ROS frame tag placed in every header
    pub frame_id: String,

    /// Overrides the sample count derived from the two rates
    pub points_per_scan: Option<u32>,

    /// Selects the explicit-range angle convention when present
    pub angle_range: Option<AngleRange>,

    /// Angular resolution, used only to cross-check the point count
    pub resolution_deg: Option<f64>,

    pub no_return: NoReturnPolicy,

    /// Replace non-finite ranges with `range_max` in the wire payload
    pub replace_infinity_with_range_max: bool,

    /// Distance from the sensor origin where rays start (meters)
    pub ray_start_offset: f32,

    /// Layer bitmask of obstacles the rays can hit
    pub obstacle_mask: u32,

    /// Cast the rays of one scan on the rayon pool
    pub parallel_rays: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            field_of_view_deg: 360.0,
            scan_rate_hz: 10.0,
            measurement_rate_hz: 4500.0,
            min_range: 0.12,
            max_range: 12.0,
            angle_offset_deg: 0.0,
            rotation_direction: RotationDirection::Ccw,
            noise_std_dev: 0.0,
            noise_seed: 0,
            frame_id: "laser".to_string(),
            points_per_scan: None,
            angle_range: None,
            resolution_deg: None,
            no_return: NoReturnPolicy::Infinity,
            replace_infinity_with_range_max: true,
            ray_start_offset: 0.02,
            obstacle_mask: u32::MAX,
            parallel_rays: false,
        }
    }
}

/// One field that was pulled back into its valid range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigAdjustment {
    pub field: &'static str,
    pub original: String,
    pub applied: String,
}

impl std::fmt::Display for ConfigAdjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.original, self.applied)
    }
}

impl ScanConfig {
    /// Angle convention selected by this config
    pub fn angle_convention(&self) -> AngleConvention {
        if self.angle_range.is_some() {
            AngleConvention::ExplicitRange
        } else {
            AngleConvention::FovCentered
        }
    }

    /// Wire payload policy for frames produced with this config
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            replace_non_finite: self.replace_infinity_with_range_max,
        }
    }

    /// Return a copy with every field inside its valid domain, plus the list
    /// of fields that had to change.
    pub fn sanitized(&self) -> (ScanConfig, Vec<ConfigAdjustment>) {
        let defaults = ScanConfig::default();
        let mut out = self.clone();
        let mut adjustments = Vec::new();

        out.field_of_view_deg = clamp_f64(
            "field_of_view_deg",
            self.field_of_view_deg,
            defaults.field_of_view_deg,
            MIN_FOV_DEG,
            MAX_FOV_DEG,
            &mut adjustments,
        );
        out.scan_rate_hz = clamp_f64(
            "scan_rate_hz",
            self.scan_rate_hz,
            defaults.scan_rate_hz,
            MIN_SCAN_RATE_HZ,
            f64::MAX,
            &mut adjustments,
        );
        out.measurement_rate_hz = clamp_f64(
            "measurement_rate_hz",
            self.measurement_rate_hz,
            defaults.measurement_rate_hz,
            MIN_MEASUREMENT_RATE_HZ,
            f64::MAX,
            &mut adjustments,
        );
        out.angle_offset_deg = clamp_f64(
            "angle_offset_deg",
            self.angle_offset_deg,
            defaults.angle_offset_deg,
            f64::MIN,
            f64::MAX,
            &mut adjustments,
        );

        out.min_range = clamp_f32(
            "min_range",
            self.min_range,
            defaults.min_range,
            0.0,
            f32::MAX,
            &mut adjustments,
        );
        out.max_range = clamp_f32(
            "max_range",
            self.max_range,
            defaults.max_range.max(out.min_range),
            out.min_range,
            f32::MAX,
            &mut adjustments,
        );
        out.noise_std_dev = clamp_f32(
            "noise_std_dev",
            self.noise_std_dev,
            defaults.noise_std_dev,
            0.0,
            f32::MAX,
            &mut adjustments,
        );
        out.ray_start_offset = clamp_f32(
            "ray_start_offset",
            self.ray_start_offset,
            defaults.ray_start_offset,
            0.0,
            f32::MAX,
            &mut adjustments,
        );

        let max_rate = out.scan_rate_hz * MAX_POINTS_PER_SCAN as f64;
        if out.measurement_rate_hz > max_rate {
            adjustments.push(adjustment(
                "measurement_rate_hz",
                out.measurement_rate_hz,
                max_rate,
            ));
            out.measurement_rate_hz = max_rate;
        }

        if let Some(points) = self.points_per_scan {
            let applied = points.clamp(1, MAX_POINTS_PER_SCAN);
            if applied != points {
                out.points_per_scan = Some(applied);
                adjustments.push(adjustment("points_per_scan", points, applied));
            }
        }

        if let Some(res) = self.resolution_deg {
            if !res.is_finite() || res <= 0.0 {
                out.resolution_deg = None;
                adjustments.push(adjustment("resolution_deg", res, "none"));
            }
        }

        out.angle_range = self
            .angle_range
            .and_then(|range| sanitize_angle_range(range, &mut adjustments));

        (out, adjustments)
    }
}

fn adjustment(
    field: &'static str,
    original: impl ToString,
    applied: impl ToString,
) -> ConfigAdjustment {
    ConfigAdjustment {
        field,
        original: original.to_string(),
        applied: applied.to_string(),
    }
}

fn clamp_f64(
    field: &'static str,
    value: f64,
    fallback: f64,
    lo: f64,
    hi: f64,
    adjustments: &mut Vec<ConfigAdjustment>,
) -> f64 {
    let applied = if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback
    };
    if applied != value {
        adjustments.push(adjustment(field, value, applied));
    }
    applied
}

fn clamp_f32(
    field: &'static str,
    value: f32,
    fallback: f32,
    lo: f32,
    hi: f32,
    adjustments: &mut Vec<ConfigAdjustment>,
) -> f32 {
    let applied = if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback
    };
    if applied != value {
        adjustments.push(adjustment(field, value, applied));
    }
    applied
}

fn sanitize_angle_range(
    range: AngleRange,
    adjustments: &mut Vec<ConfigAdjustment>,
) -> Option<AngleRange> {
    if !range.min_rad.is_finite() || !range.max_rad.is_finite() {
        adjustments.push(adjustment(
            "angle_range",
            format!("[{}, {}]", range.min_rad, range.max_rad),
            "fov_centered",
        ));
        return None;
    }

    let (mut min_rad, mut max_rad) = (range.min_rad, range.max_rad);
    if max_rad < min_rad {
        std::mem::swap(&mut min_rad, &mut max_rad);
    }

    let min_span = MIN_FOV_DEG.to_radians();
    let span = max_rad - min_rad;
    if span < min_span {
        max_rad = min_rad + min_span;
    } else if span > TAU {
        max_rad = min_rad + TAU;
    }

    let applied = AngleRange { min_rad, max_rad };
    if applied != range {
        adjustments.push(adjustment(
            "angle_range",
            format!("[{}, {}]", range.min_rad, range.max_rad),
            format!("[{}, {}]", min_rad, max_rad),
        ));
    }
    Some(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_already_valid() {
        let (clean, adjustments) = ScanConfig::default().sanitized();
        assert!(adjustments.is_empty(), "{adjustments:?}");
        assert_eq!(clean, ScanConfig::default());
    }

    #[test]
    fn test_degenerate_rates_are_floored() {
        let config = ScanConfig {
            scan_rate_hz: 0.0,
            measurement_rate_hz: -20.0,
            field_of_view_deg: -1.0,
            ..Default::default()
        };
        let (clean, adjustments) = config.sanitized();
        assert_eq!(clean.scan_rate_hz, MIN_SCAN_RATE_HZ);
        assert_eq!(clean.measurement_rate_hz, MIN_MEASUREMENT_RATE_HZ);
        assert_eq!(clean.field_of_view_deg, MIN_FOV_DEG);
        assert_eq!(adjustments.len(), 3);
    }

    #[test]
    fn test_fov_capped_at_full_turn() {
        let config = ScanConfig {
            field_of_view_deg: 720.0,
            ..Default::default()
        };
        assert_eq!(config.sanitized().0.field_of_view_deg, 360.0);
    }

    #[test]
    fn test_inverted_ranges_are_collapsed() {
        let config = ScanConfig {
            min_range: 5.0,
            max_range: 2.0,
            ..Default::default()
        };
        let (clean, adjustments) = config.sanitized();
        assert_eq!(clean.min_range, 5.0);
        assert_eq!(clean.max_range, 5.0);
        assert_eq!(adjustments[0].field, "max_range");
    }

    #[test]
    fn test_non_finite_falls_back_to_default() {
        let config = ScanConfig {
            scan_rate_hz: f64::NAN,
            noise_std_dev: f32::INFINITY,
            ..Default::default()
        };
        let (clean, _) = config.sanitized();
        assert_eq!(clean.scan_rate_hz, 10.0);
        assert_eq!(clean.noise_std_dev, 0.0);
    }

    #[test]
    fn test_zero_point_override_floored() {
        let config = ScanConfig {
            points_per_scan: Some(0),
            ..Default::default()
        };
        assert_eq!(config.sanitized().0.points_per_scan, Some(1));
    }

    #[test]
    fn test_point_count_capped() {
        let config = ScanConfig {
            scan_rate_hz: 1.0,
            measurement_rate_hz: 1e12,
            points_per_scan: Some(u32::MAX),
            ..Default::default()
        };
        let (clean, adjustments) = config.sanitized();
        assert_eq!(clean.measurement_rate_hz, MAX_POINTS_PER_SCAN as f64);
        assert_eq!(clean.points_per_scan, Some(MAX_POINTS_PER_SCAN));
        assert_eq!(adjustments.len(), 2);
    }

    #[test]
    fn test_angle_range_swapped_and_widened() {
        let config = ScanConfig {
            angle_range: Some(AngleRange {
                min_rad: 1.0,
                max_rad: -1.0,
            }),
            ..Default::default()
        };
        let range = config.sanitized().0.angle_range.unwrap();
        assert_eq!(range.min_rad, -1.0);
        assert_eq!(range.max_rad, 1.0);

        let config = ScanConfig {
            angle_range: Some(AngleRange {
                min_rad: 0.5,
                max_rad: 0.5,
            }),
            ..Default::default()
        };
        let range = config.sanitized().0.angle_range.unwrap();
        assert!(range.max_rad > range.min_rad);
    }

    #[test]
    fn test_convention_follows_angle_range() {
        let mut config = ScanConfig::default();
        assert_eq!(config.angle_convention(), AngleConvention::FovCentered);
        config.angle_range = Some(AngleRange {
            min_rad: -std::f64::consts::PI,
            max_rad: std::f64::consts::PI,
        });
        assert_eq!(config.angle_convention(), AngleConvention::ExplicitRange);
    }

    #[test]
    fn test_rotation_sign() {
        assert_eq!(RotationDirection::Cw.sign(), -1.0);
        assert_eq!(RotationDirection::Ccw.sign(), 1.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScanConfig =
            serde_json::from_str(r#"{"scan_rate_hz": 5.0, "rotation_direction": "cw"}"#).unwrap();
        assert_eq!(config.scan_rate_hz, 5.0);
        assert_eq!(config.rotation_direction, RotationDirection::Cw);
        assert_eq!(config.frame_id, "laser");
    }
}
