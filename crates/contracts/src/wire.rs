//! Binary wire frame, version 2
//!
//! ```text
//! offset  size  field
//! 0       4     magic "LIDR"
//! 4       2     version (u16)
//! 6       4     point count n (u32)
//! 10      4     stamp_sec (i32)
//! 14      4     stamp_nanosec (u32)
//! 18      4     angle_min (f32)
//! 22      4     angle_max (f32)
//! 26      4     angle_increment (f32)
//! 30      4     time_increment (f32)
//! 34      4     scan_time (f32)
//! 38      4     range_min (f32)
//! 42      4     range_max (f32)
//! 46      4*n   ranges (f32)
//! ```
//!
//! All fields little-endian. `frame_id` and intensities are not transmitted.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ScanHeader, ScanMessage, Stamp};

pub const MAGIC: [u8; 4] = *b"LIDR";
pub const WIRE_VERSION: u16 = 2;
pub const HEADER_LEN: usize = 46;

/// Encoded size of a frame carrying `points` ranges
#[inline]
pub const fn frame_len(points: usize) -> usize {
    HEADER_LEN + 4 * points
}

/// Total length of the frame at the start of `buf`, once its header is in.
///
/// Used to cut frames out of a byte stream; validates nothing but length.
pub fn peek_frame_len(buf: &[u8]) -> Option<usize> {
    let count = buf.get(6..10)?;
    let points = u32::from_le_bytes([count[0], count[1], count[2], count[3]]);
    Some(frame_len(points as usize))
}

/// Decode failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("bad magic {0:02x?}, expected \"LIDR\"")]
    BadMagic([u8; 4]),

    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u16),

    #[error("frame truncated: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("frame has {extra} trailing bytes after {points} ranges")]
    TrailingBytes { points: u32, extra: usize },

    #[error("stamp nanoseconds out of range: {0}")]
    InvalidNanos(u32),
}

/// Payload policy applied at encode time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Substitute non-finite ranges with `range_max`
    pub replace_non_finite: bool,
}

impl EncodeOptions {
    /// Range as it leaves the process under this policy
    #[inline]
    pub fn resolve_range(&self, range: f32, range_max: f32) -> f32 {
        if self.replace_non_finite && !range.is_finite() {
            range_max
        } else {
            range
        }
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            replace_non_finite: true,
        }
    }
}

/// Stateless scan serializer
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanEncoder {
    options: EncodeOptions,
}

impl ScanEncoder {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> EncodeOptions {
        self.options
    }

    /// Serialize one scan into a wire frame of exactly `46 + 4n` bytes.
    pub fn encode(&self, msg: &ScanMessage) -> Bytes {
        let n = msg.ranges.len();
        let mut buf = BytesMut::with_capacity(frame_len(n));

        buf.put_slice(&MAGIC);
        buf.put_u16_le(WIRE_VERSION);
        buf.put_u32_le(n as u32);
        buf.put_i32_le(msg.header.stamp.sec);
        buf.put_u32_le(msg.header.stamp.nanosec);
        buf.put_f32_le(msg.angle_min);
        buf.put_f32_le(msg.angle_max);
        buf.put_f32_le(msg.angle_increment);
        buf.put_f32_le(msg.time_increment);
        buf.put_f32_le(msg.scan_time);
        buf.put_f32_le(msg.range_min);
        buf.put_f32_le(msg.range_max);

        for &range in &msg.ranges {
            buf.put_f32_le(self.options.resolve_range(range, msg.range_max));
        }

        debug_assert_eq!(buf.len(), frame_len(n));
        buf.freeze()
    }
}

/// Parse a wire frame back into a message.
///
/// The result has an empty `frame_id` and zeroed intensities.
pub fn decode(frame: &[u8]) -> Result<ScanMessage, WireError> {
    if frame.len() < HEADER_LEN {
        return Err(WireError::Truncated {
            needed: HEADER_LEN,
            actual: frame.len(),
        });
    }

    let mut buf = frame;
    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    if magic != MAGIC {
        return Err(WireError::BadMagic(magic));
    }

    let version = buf.get_u16_le();
    if version != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }

    let points = buf.get_u32_le();
    let needed = frame_len(points as usize);
    if frame.len() < needed {
        return Err(WireError::Truncated {
            needed,
            actual: frame.len(),
        });
    }
    if frame.len() > needed {
        return Err(WireError::TrailingBytes {
            points,
            extra: frame.len() - needed,
        });
    }

    let sec = buf.get_i32_le();
    let nanosec = buf.get_u32_le();
    if nanosec >= 1_000_000_000 {
        return Err(WireError::InvalidNanos(nanosec));
    }

    let angle_min = buf.get_f32_le();
    let angle_max = buf.get_f32_le();
    let angle_increment = buf.get_f32_le();
    let time_increment = buf.get_f32_le();
    let scan_time = buf.get_f32_le();
    let range_min = buf.get_f32_le();
    let range_max = buf.get_f32_le();

    let ranges: Vec<f32> = (0..points).map(|_| buf.get_f32_le()).collect();
    let intensities = vec![0.0; ranges.len()];

    Ok(ScanMessage {
        header: ScanHeader {
            stamp: Stamp { sec, nanosec },
            frame_id: String::new(),
        },
        angle_min,
        angle_max,
        angle_increment,
        time_increment,
        scan_time,
        range_min,
        range_max,
        ranges,
        intensities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ranges: Vec<f32>) -> ScanMessage {
        let n = ranges.len();
        ScanMessage {
            header: ScanHeader {
                stamp: Stamp {
                    sec: 7,
                    nanosec: 500_000_000,
                },
                frame_id: "laser".into(),
            },
            angle_min: -1.0,
            angle_max: 1.0,
            angle_increment: 1.0,
            time_increment: 0.1 / n as f32,
            scan_time: 0.1,
            range_min: 0.12,
            range_max: 12.0,
            ranges,
            intensities: vec![0.0; n],
        }
    }

    fn f32_at(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_header_layout() {
        let bytes = ScanEncoder::default().encode(&sample(vec![1.0, 2.0, 3.0]));
        assert_eq!(bytes.len(), 46 + 12);
        assert_eq!(&bytes[0..4], b"LIDR");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 2);
        assert_eq!(u32::from_le_bytes(bytes[6..10].try_into().unwrap()), 3);
        assert_eq!(i32::from_le_bytes(bytes[10..14].try_into().unwrap()), 7);
        assert_eq!(
            u32::from_le_bytes(bytes[14..18].try_into().unwrap()),
            500_000_000
        );
        assert_eq!(f32_at(&bytes, 18), -1.0);
        assert_eq!(f32_at(&bytes, 22), 1.0);
        assert_eq!(f32_at(&bytes, 34), 0.1);
        assert_eq!(f32_at(&bytes, 38), 0.12);
        assert_eq!(f32_at(&bytes, 42), 12.0);
        assert_eq!(f32_at(&bytes, 46), 1.0);
        assert_eq!(f32_at(&bytes, 54), 3.0);
    }

    #[test]
    fn test_infinity_replaced_with_range_max() {
        let bytes = ScanEncoder::default().encode(&sample(vec![1.0, f32::INFINITY, 3.0]));
        let payload: Vec<f32> = (0..3).map(|i| f32_at(&bytes, 46 + 4 * i)).collect();
        assert_eq!(payload, vec![1.0, 12.0, 3.0]);
    }

    #[test]
    fn test_infinity_kept_when_policy_off() {
        let encoder = ScanEncoder::new(EncodeOptions {
            replace_non_finite: false,
        });
        let bytes = encoder.encode(&sample(vec![f32::INFINITY]));
        assert!(f32_at(&bytes, 46).is_infinite());
    }

    #[test]
    fn test_decode_restores_fields() {
        let mut msg = sample(vec![0.5, 4.25, 11.0]);
        msg.header.frame_id.clear();
        let decoded = decode(&ScanEncoder::default().encode(&msg)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_decode_keeps_infinity_when_policy_off() {
        let mut msg = sample(vec![f32::INFINITY, 2.0]);
        msg.header.frame_id.clear();
        let encoder = ScanEncoder::new(EncodeOptions {
            replace_non_finite: false,
        });
        assert_eq!(decode(&encoder.encode(&msg)).unwrap(), msg);
    }

    #[test]
    fn test_peek_frame_len() {
        let bytes = ScanEncoder::default().encode(&sample(vec![1.0; 5]));
        assert_eq!(peek_frame_len(&bytes[..10]), Some(66));
        assert_eq!(peek_frame_len(&bytes[..9]), None);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let good = ScanEncoder::default().encode(&sample(vec![1.0, 2.0]));

        assert!(matches!(
            decode(&good[..20]),
            Err(WireError::Truncated { needed: 46, .. })
        ));
        assert!(matches!(
            decode(&good[..good.len() - 1]),
            Err(WireError::Truncated { needed: 54, .. })
        ));

        let mut bad = good.to_vec();
        bad[0] = b'X';
        assert!(matches!(decode(&bad), Err(WireError::BadMagic(_))));

        let mut bad = good.to_vec();
        bad[4] = 1;
        assert_eq!(decode(&bad), Err(WireError::UnsupportedVersion(1)));

        let mut bad = good.to_vec();
        bad[14..18].copy_from_slice(&1_000_000_000u32.to_le_bytes());
        assert_eq!(decode(&bad), Err(WireError::InvalidNanos(1_000_000_000)));

        let mut bad = good.to_vec();
        bad.push(0);
        assert!(matches!(
            decode(&bad),
            Err(WireError::TrailingBytes { extra: 1, .. })
        ));
    }
}
