//! # Scan Engine
//!
//! 旋转式 2D 激光雷达仿真核心。
//!
//! 负责：
//! - 仿真时钟（单写者，多读者）
//! - 扫描几何与时序推导
//! - 逐射线场景查询 + 高斯噪声
//! - 每个仿真步驱动所有传感器
//!
//! ## 使用示例
//!
//! ```
//! use std::sync::Arc;
//! use scan_engine::{EmptyEnvironment, LidarSensor, Simulation};
//! use contracts::ScanConfig;
//!
//! let mut sim = Simulation::new();
//! sim.set_environment(Arc::new(EmptyEnvironment));
//! let sensor = LidarSensor::new("front", ScanConfig::default(), sim.clock());
//! sim.add_sensor(sensor).unwrap();
//!
//! let report = sim.step(0.01);
//! assert_eq!(report.frames.len(), 1);
//! ```

mod clock;
mod environment;
mod geometry;
mod noise;
mod scene;
mod sensor;
mod simulation;

/// Linear algebra types used by poses and ray queries
pub use parry3d::na;

pub use clock::{ClockHandle, SimulationClock};
pub use environment::{EmptyEnvironment, QueryFilter, RayCastEnvironment, RayHit};
pub use geometry::ScanGeometry;
pub use noise::RangeNoise;
pub use scene::{pose_from_transform, Scene, SceneObject};
pub use sensor::{LidarSensor, SensorStats, StepOutcome};
pub use simulation::{Simulation, StepReport};
