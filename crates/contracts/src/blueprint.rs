//! SimBlueprint - Config Loader 输出
//!
//! 描述完整的仿真配置：步进参数、激光雷达、场景障碍物、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::ScanConfig;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的仿真配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 步进设置
    #[serde(default)]
    #[validate(nested)]
    pub simulation: SimulationConfig,

    /// 激光雷达列表
    #[validate(nested)]
    pub sensors: Vec<SensorConfig>,

    /// 场景几何
    #[serde(default)]
    #[validate(nested)]
    pub scene: SceneConfig,

    /// 输出路由配置
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

impl SimBlueprint {
    pub fn sensor(&self, id: &str) -> Option<&SensorConfig> {
        self.sensors.iter().find(|sensor| sensor.id == id)
    }

    pub fn enabled_sensors(&self) -> impl Iterator<Item = &SensorConfig> {
        self.sensors.iter().filter(|sensor| sensor.enabled)
    }
}

/// 步进配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimulationConfig {
    /// 步进频率 (Hz)，必须 > 0
    #[serde(default = "default_step_hz")]
    #[validate(range(exclusive_min = 0.0))]
    pub step_hz: f64,

    /// 仿真时长 (秒)，None 表示一直运行
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub duration_sec: Option<f64>,

    /// 按墙钟节奏步进
    #[serde(default = "default_true")]
    pub realtime: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_hz: default_step_hz(),
            duration_sec: None,
            realtime: true,
        }
    }
}

impl SimulationConfig {
    /// Step length in seconds
    pub fn step_dt(&self) -> f64 {
        1.0 / self.step_hz
    }
}

fn default_step_hz() -> f64 {
    100.0
}

fn default_true() -> bool {
    true
}

/// 激光雷达配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SensorConfig {
    /// 唯一标识符
    #[validate(length(min = 1))]
    pub id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 世界坐标系中的安装位姿
    #[serde(default)]
    pub mount: Transform,

    /// 扫描参数
    #[serde(default)]
    pub scan: ScanConfig,
}

/// 3D 变换：位置 + 旋转
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// 位置 (x, y, z) 单位：米
    #[serde(default)]
    pub location: Location,

    /// 旋转 (pitch, yaw, roll) 单位：度
    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub roll: f64,
}

/// 场景配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SceneConfig {
    #[serde(default)]
    #[validate(nested)]
    pub obstacles: Vec<ObstacleConfig>,
}

/// 障碍物
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObstacleConfig {
    /// 唯一标识符
    #[validate(length(min = 1))]
    pub id: String,

    pub shape: ShapeConfig,

    #[serde(default)]
    pub transform: Transform,

    /// 碰撞层位掩码，与传感器的 obstacle_mask 相与
    #[serde(default = "default_layers")]
    pub layers: u32,

    /// 仅触发体积，射线默认忽略
    #[serde(default)]
    pub trigger: bool,

    /// 所属传感器 ID，该传感器的射线会忽略此几何体
    #[serde(default)]
    pub owner: Option<String>,
}

fn default_layers() -> u32 {
    1
}

/// 几何形状 (米)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeConfig {
    Box { half_extents: [f32; 3] },
    Ball { radius: f32 },
    /// 轴沿局部 Z
    Cylinder { half_height: f32, radius: f32 },
    /// 过 transform 原点的无限平面
    Plane { normal: [f32; 3] },
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink 名称
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出
    File,
    /// UDP 数据报
    Udp,
    /// TCP 长连接
    Tcp,
}

impl SinkType {
    /// 是否需要 `addr` 参数
    pub fn needs_addr(self) -> bool {
        matches!(self, Self::Udp | Self::Tcp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blueprint() -> SimBlueprint {
        SimBlueprint {
            version: ConfigVersion::V1,
            simulation: SimulationConfig::default(),
            sensors: vec![
                SensorConfig {
                    id: "front".into(),
                    enabled: true,
                    mount: Transform::default(),
                    scan: ScanConfig::default(),
                },
                SensorConfig {
                    id: "rear".into(),
                    enabled: false,
                    mount: Transform::default(),
                    scan: ScanConfig::default(),
                },
            ],
            scene: SceneConfig::default(),
            sinks: vec![],
        }
    }

    #[test]
    fn test_sensor_lookup() {
        let blueprint = sample_blueprint();
        assert!(blueprint.sensor("rear").is_some());
        assert!(blueprint.sensor("side").is_none());
        let enabled: Vec<_> = blueprint.enabled_sensors().map(|s| s.id.as_str()).collect();
        assert_eq!(enabled, vec!["front"]);
    }

    #[test]
    fn test_field_rules() {
        let mut blueprint = sample_blueprint();
        assert!(blueprint.validate().is_ok());

        blueprint.simulation.step_hz = 0.0;
        blueprint.sensors[0].id.clear();
        let errors = blueprint.validate().unwrap_err();
        let text = errors.to_string();
        assert!(text.contains("step_hz"), "{text}");
        assert!(text.contains("id"), "{text}");
    }

    #[test]
    fn test_shape_tagged_by_kind() {
        let shape: ShapeConfig =
            serde_json::from_str(r#"{"kind": "ball", "radius": 0.5}"#).unwrap();
        assert_eq!(shape, ShapeConfig::Ball { radius: 0.5 });
    }

    #[test]
    fn test_step_dt() {
        let sim = SimulationConfig {
            step_hz: 50.0,
            ..Default::default()
        };
        assert_eq!(sim.step_dt(), 0.02);
    }
}
