//! 把每帧扫描的摘要写进 tracing 日志，便于在没有下游消费者时检查管线。

use contracts::{ContractError, ScanFrame, ScanSink};
use tracing::{debug, info};

pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ScanSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, frame: &ScanFrame) -> Result<(), ContractError> {
        let scan = &frame.scan;
        let nearest = scan.valid_ranges().min_by(f32::total_cmp);

        info!(
            sink = %self.name,
            sensor_id = %frame.sensor_id,
            frame_id = %scan.header.frame_id,
            sequence = frame.sequence,
            sim_time = frame.sim_time,
            stamp = %format_args!("{}.{:09}", scan.header.stamp.sec, scan.header.stamp.nanosec),
            points = scan.len(),
            hits = frame.hits,
            nearest_m = ?nearest,
            "scan"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "log sink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_frame;

    #[tokio::test]
    async fn test_log_sink_accepts_every_frame() {
        let mut sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
        for seq in 1..=3 {
            sink.write(&sample_frame("front", seq)).await.unwrap();
        }
        sink.flush().await.unwrap();
        sink.close().await.unwrap();
    }
}
