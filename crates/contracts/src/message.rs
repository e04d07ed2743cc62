//! ScanMessage - ROS `sensor_msgs/LaserScan` compatible payload

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// ROS time stamp: whole seconds plus nanoseconds in `[0, 1e9)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: i32,
    pub nanosec: u32,
}

impl Stamp {
    /// Split simulation seconds into a stamp.
    ///
    /// The fractional part is rounded to the nearest nanosecond, carrying
    /// into `sec` when it rounds up to a full second.
    pub fn from_seconds(seconds: f64) -> Self {
        if !seconds.is_finite() {
            return Self::default();
        }

        let whole = seconds.floor();
        let mut sec = whole.clamp(i32::MIN as f64, i32::MAX as f64) as i64;
        let mut nanos = ((seconds - whole) * NANOS_PER_SEC).round() as i64;
        if nanos >= NANOS_PER_SEC as i64 {
            sec += 1;
            nanos -= NANOS_PER_SEC as i64;
        }

        Self {
            sec: sec.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            nanosec: nanos.clamp(0, NANOS_PER_SEC as i64 - 1) as u32,
        }
    }

    pub fn as_seconds(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 / NANOS_PER_SEC
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanHeader {
    pub stamp: Stamp,
    pub frame_id: String,
}

/// One complete rotation.
///
/// Invariant: `ranges.len() == intensities.len() >= 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMessage {
    pub header: ScanHeader,
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
    /// Time between consecutive samples (seconds)
    pub time_increment: f32,
    /// Time for one full rotation (seconds)
    pub scan_time: f32,
    pub range_min: f32,
    pub range_max: f32,
    /// `+inf` marks a ray without a return
    #[serde(with = "no_return")]
    pub ranges: Vec<f32>,
    pub intensities: Vec<f32>,
}

/// JSON has no infinity: a missing return is written as `null` and read back as `+inf`.
mod no_return {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ranges: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(ranges.len()))?;
        for range in ranges {
            seq.serialize_element(&range.is_finite().then_some(*range))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let ranges = Vec::<Option<f32>>::deserialize(deserializer)?;
        Ok(ranges
            .into_iter()
            .map(|r| r.unwrap_or(f32::INFINITY))
            .collect())
    }
}

impl ScanMessage {
    /// Number of samples
    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Message-frame angle of sample `index`
    #[inline]
    pub fn angle_at(&self, index: usize) -> f32 {
        self.angle_min + index as f32 * self.angle_increment
    }

    /// Ranges that reported an obstacle (finite and inside the valid span)
    pub fn valid_ranges(&self) -> impl Iterator<Item = f32> + '_ {
        let (lo, hi) = (self.range_min, self.range_max);
        self.ranges
            .iter()
            .copied()
            .filter(move |r| r.is_finite() && *r >= lo && *r <= hi)
    }
}

/// One ray result with its hit flag, kept alongside the last message
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanSample {
    /// Message-frame angle (radians)
    pub angle: f32,
    pub range: f32,
    pub intensity: f32,
    pub hit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_split() {
        let stamp = Stamp::from_seconds(12.25);
        assert_eq!(stamp.sec, 12);
        assert_eq!(stamp.nanosec, 250_000_000);
    }

    #[test]
    fn test_stamp_carries_rounded_second() {
        let stamp = Stamp::from_seconds(2.999_999_999_9);
        assert_eq!(stamp.sec, 3);
        assert_eq!(stamp.nanosec, 0);
    }

    #[test]
    fn test_stamp_zero_and_non_finite() {
        assert_eq!(Stamp::from_seconds(0.0), Stamp::default());
        assert_eq!(Stamp::from_seconds(f64::NAN), Stamp::default());
    }

    #[test]
    fn test_stamp_ordering_follows_time() {
        let a = Stamp::from_seconds(1.9);
        let b = Stamp::from_seconds(2.1);
        assert!(a < b);
        assert!((b.as_seconds() - 2.1).abs() < 1e-9);
    }

    #[test]
    fn test_valid_ranges_skip_sentinels() {
        let msg = ScanMessage {
            header: ScanHeader::default(),
            angle_min: 0.0,
            angle_max: 0.2,
            angle_increment: 0.1,
            time_increment: 0.01,
            scan_time: 0.03,
            range_min: 0.1,
            range_max: 10.0,
            ranges: vec![1.0, f32::INFINITY, 3.0],
            intensities: vec![0.0; 3],
        };
        assert_eq!(msg.valid_ranges().collect::<Vec<_>>(), vec![1.0, 3.0]);
        assert!((msg.angle_at(2) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_no_return_survives_json() {
        let msg = ScanMessage {
            header: ScanHeader::default(),
            angle_min: 0.0,
            angle_max: 0.2,
            angle_increment: 0.1,
            time_increment: 0.01,
            scan_time: 0.03,
            range_min: 0.1,
            range_max: 10.0,
            ranges: vec![1.0, f32::INFINITY, 3.0],
            intensities: vec![0.0; 3],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["ranges"], serde_json::json!([1.0, null, 3.0]));

        let back: ScanMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }
}
