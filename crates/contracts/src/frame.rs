//! ScanFrame - envelope handed from the step loop to the dispatcher

use bytes::Bytes;
use std::sync::Arc;

use crate::{EncodeOptions, ScanEncoder, ScanMessage, SensorId};

/// One published scan plus the context sinks need to route and encode it
#[derive(Debug, Clone)]
pub struct ScanFrame {
    pub sensor_id: SensorId,

    /// Per-sensor sequence, starting at 1
    pub sequence: u64,

    /// Clock reading when the scan started (seconds)
    pub sim_time: f64,

    /// Rays that hit an obstacle
    pub hits: u32,

    /// Payload policy of the producing sensor
    pub encode_options: EncodeOptions,

    pub scan: Arc<ScanMessage>,
}

impl ScanFrame {
    /// Encode with the producing sensor's payload policy
    pub fn encode(&self) -> Bytes {
        ScanEncoder::new(self.encode_options).encode(&self.scan)
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.scan.len()
    }
}
