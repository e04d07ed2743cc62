//! 扫描指标收集模块
//!
//! 基于 ScanFrame 收集和统计仿真运行指标。

use std::collections::BTreeMap;

use contracts::ScanFrame;
use metrics::{counter, gauge, histogram};

/// 从 ScanFrame 记录指标
///
/// 每次从仿真步进中取得一帧扫描时调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_scan_metrics;
///
/// let report = simulation.step(dt);
/// for frame in &report.frames {
///     record_scan_metrics(frame);
/// }
/// ```
pub fn record_scan_metrics(frame: &ScanFrame) {
    let sensor_id = frame.sensor_id.to_string();
    let points = frame.point_count();

    gauge!("lidar_last_sequence", "sensor_id" => sensor_id.clone()).set(frame.sequence as f64);
    gauge!("lidar_scan_points", "sensor_id" => sensor_id.clone()).set(points as f64);

    // 命中率
    if points > 0 {
        let ratio = frame.hits as f64 / points as f64;
        histogram!("lidar_scan_hit_ratio", "sensor_id" => sensor_id.clone()).record(ratio);
    }

    // 最近障碍物距离
    if let Some(nearest) = frame.scan.valid_ranges().min_by(f32::total_cmp) {
        gauge!("lidar_nearest_range_meters", "sensor_id" => sensor_id).set(nearest as f64);
    }
}

/// 记录因缺少环境而跳过的扫描
pub fn record_scan_skipped(sensor_id: &str) {
    counter!(
        "lidar_scans_without_environment_total",
        "sensor_id" => sensor_id.to_string()
    )
    .increment(1);
}

/// 记录步进耗时 (毫秒)
pub fn record_step_duration_ms(duration_ms: f64) {
    histogram!("sim_step_duration_ms").record(duration_ms);
}

/// 记录 transport 事件
pub fn record_transport_event(transport: &str, kind: &'static str) {
    counter!(
        "transport_events_total",
        "transport" => transport.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// 单个传感器的聚合统计
#[derive(Debug, Clone, Default)]
pub struct SensorAggregate {
    /// 扫描次数
    pub scans: u64,
    /// 缺少环境而跳过的次数
    pub skipped: u64,
    /// 最后一帧的序号
    pub last_sequence: u64,
    /// 命中率统计
    pub hit_ratio: RunningStats,
    /// 最近距离统计 (米)
    pub nearest_range: RunningStats,
}

/// 扫描指标聚合器
///
/// 在内存中聚合指标，便于在运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct ScanMetricsAggregator {
    /// 总扫描数
    pub total_scans: u64,

    /// 总点数
    pub total_points: u64,

    /// 缺少环境跳过的扫描
    pub total_skipped: u64,

    /// 扫描间隔统计 (仿真秒)
    pub interval_stats: RunningStats,

    /// 各传感器统计
    pub sensors: BTreeMap<String, SensorAggregate>,

    last_sim_time: BTreeMap<String, f64>,
}

impl ScanMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, frame: &ScanFrame) {
        let points = frame.point_count();
        self.total_scans += 1;
        self.total_points += points as u64;

        let key = frame.sensor_id.to_string();
        if let Some(previous) = self.last_sim_time.insert(key.clone(), frame.sim_time) {
            let interval = frame.sim_time - previous;
            if interval >= 0.0 {
                self.interval_stats.push(interval);
            }
        }

        let sensor = self.sensors.entry(key).or_default();
        sensor.scans += 1;
        sensor.last_sequence = frame.sequence;
        if points > 0 {
            sensor
                .hit_ratio
                .push(frame.hits as f64 / points as f64);
        }
        if let Some(nearest) = frame.scan.valid_ranges().min_by(f32::total_cmp) {
            sensor.nearest_range.push(nearest as f64);
        }
    }

    /// 记录一次跳过
    pub fn record_skipped(&mut self, sensor_id: &str) {
        self.total_skipped += 1;
        self.sensors
            .entry(sensor_id.to_string())
            .or_default()
            .skipped += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_scans: self.total_scans,
            total_points: self.total_points,
            total_skipped: self.total_skipped,
            skip_rate: if self.total_scans + self.total_skipped > 0 {
                self.total_skipped as f64 / (self.total_scans + self.total_skipped) as f64 * 100.0
            } else {
                0.0
            },
            scan_interval_s: StatsSummary::from(&self.interval_stats),
            sensors: self
                .sensors
                .iter()
                .map(|(id, s)| {
                    (
                        id.clone(),
                        SensorSummary {
                            scans: s.scans,
                            skipped: s.skipped,
                            last_sequence: s.last_sequence,
                            hit_ratio: StatsSummary::from(&s.hit_ratio),
                            nearest_range_m: StatsSummary::from(&s.nearest_range),
                        },
                    )
                })
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 单个传感器摘要
#[derive(Debug, Clone, Default)]
pub struct SensorSummary {
    pub scans: u64,
    pub skipped: u64,
    pub last_sequence: u64,
    pub hit_ratio: StatsSummary,
    pub nearest_range_m: StatsSummary,
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_scans: u64,
    pub total_points: u64,
    pub total_skipped: u64,
    pub skip_rate: f64,
    pub scan_interval_s: StatsSummary,
    pub sensors: BTreeMap<String, SensorSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Scan Metrics Summary ===")?;
        writeln!(f, "Total scans: {}", self.total_scans)?;
        writeln!(f, "Total points: {}", self.total_points)?;
        writeln!(
            f,
            "Skipped (no environment): {} ({:.2}%)",
            self.total_skipped, self.skip_rate
        )?;
        writeln!(f, "Scan interval (s): {}", self.scan_interval_s)?;

        for (id, sensor) in &self.sensors {
            writeln!(
                f,
                "  [{}] scans={} skipped={} last_seq={}",
                id, sensor.scans, sensor.skipped, sensor.last_sequence
            )?;
            writeln!(f, "    hit ratio: {}", sensor.hit_ratio)?;
            writeln!(f, "    nearest (m): {}", sensor.nearest_range_m)?;
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EncodeOptions, ScanHeader, ScanMessage, Stamp};
    use std::sync::Arc;

    fn frame(sensor: &str, sequence: u64, sim_time: f64, ranges: Vec<f32>) -> ScanFrame {
        let n = ranges.len();
        let hits = ranges.iter().filter(|r| r.is_finite()).count() as u32;
        ScanFrame {
            sensor_id: sensor.into(),
            sequence,
            sim_time,
            hits,
            encode_options: EncodeOptions::default(),
            scan: Arc::new(ScanMessage {
                header: ScanHeader {
                    stamp: Stamp::from_seconds(sim_time),
                    frame_id: "laser".into(),
                },
                angle_min: 0.0,
                angle_max: 1.0,
                angle_increment: 1.0 / n as f32,
                time_increment: 0.01,
                scan_time: 0.1,
                range_min: 0.1,
                range_max: 10.0,
                ranges,
                intensities: vec![0.0; n],
            }),
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = ScanMetricsAggregator::new();

        aggregator.update(&frame("front", 1, 0.0, vec![2.0, f32::INFINITY]));
        aggregator.update(&frame("front", 2, 0.1, vec![1.0, 3.0]));
        aggregator.record_skipped("rear");

        assert_eq!(aggregator.total_scans, 2);
        assert_eq!(aggregator.total_points, 4);
        assert_eq!(aggregator.total_skipped, 1);

        let front = &aggregator.sensors["front"];
        assert_eq!(front.scans, 2);
        assert_eq!(front.last_sequence, 2);
        assert!((front.hit_ratio.mean() - 0.75).abs() < 1e-10);
        assert!((front.nearest_range.min() - 1.0).abs() < 1e-10);
        assert!((aggregator.interval_stats.mean() - 0.1).abs() < 1e-10);
        assert_eq!(aggregator.sensors["rear"].skipped, 1);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = ScanMetricsAggregator::new();
        aggregator.update(&frame("front", 1, 0.0, vec![2.0; 4]));
        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Total scans: 1"));
        assert!(output.contains("[front] scans=1"));
        assert!(output.contains("0.00%"));
    }
}
