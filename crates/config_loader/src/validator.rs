//! 配置校验模块
//!
//! 硬性错误（返回 `ConfigValidation`）：
//! - 字段级约束（`validator` derive）
//! - sensor / obstacle / sink 名称唯一且非空
//! - frame_id 非空
//! - step_hz 为有限正数
//! - udp / tcp sink 的 addr 存在且可解析
//! - obstacle.owner 指向已存在的传感器
//!
//! 超出范围的扫描参数不是错误，会被夹紧并作为警告返回。

use std::collections::HashSet;
use std::net::SocketAddr;

use ::validator::Validate;
use contracts::{ConfigAdjustment, ContractError, SimBlueprint};

/// 某个传感器扫描参数的一次夹紧
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub sensor_id: String,
    pub adjustment: ConfigAdjustment,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sensors[{}].scan.{}", self.sensor_id, self.adjustment)
    }
}

/// 校验 SimBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SimBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))?;
    validate_simulation(blueprint)?;
    validate_sensors(blueprint)?;
    validate_obstacles(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 收集所有扫描参数的夹紧记录
pub fn collect_warnings(blueprint: &SimBlueprint) -> Vec<ConfigWarning> {
    blueprint
        .sensors
        .iter()
        .flat_map(|sensor| {
            let (_, adjustments) = sensor.scan.sanitized();
            adjustments.into_iter().map(|adjustment| ConfigWarning {
                sensor_id: sensor.id.clone(),
                adjustment,
            })
        })
        .collect()
}

fn validate_simulation(blueprint: &SimBlueprint) -> Result<(), ContractError> {
    let step_hz = blueprint.simulation.step_hz;
    if !step_hz.is_finite() || step_hz <= 0.0 {
        return Err(ContractError::config_validation(
            "simulation.step_hz",
            format!("step_hz must be a finite value > 0, got {}", step_hz),
        ));
    }
    if let Some(duration) = blueprint.simulation.duration_sec {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ContractError::config_validation(
                "simulation.duration_sec",
                format!("duration_sec must be a finite value > 0, got {}", duration),
            ));
        }
    }
    Ok(())
}

/// sensor id 唯一、非空；frame_id 非空
fn validate_sensors(blueprint: &SimBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sensor) in blueprint.sensors.iter().enumerate() {
        if sensor.id.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sensors[{}].id", idx),
                "sensor id cannot be empty",
            ));
        }
        if !seen.insert(sensor.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("sensors[id={}]", sensor.id),
                "duplicate sensor id",
            ));
        }
        if sensor.scan.frame_id.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sensors[{}].scan.frame_id", sensor.id),
                "frame_id cannot be empty",
            ));
        }
    }
    Ok(())
}

fn validate_obstacles(blueprint: &SimBlueprint) -> Result<(), ContractError> {
    let sensor_ids: HashSet<_> = blueprint.sensors.iter().map(|s| s.id.as_str()).collect();
    let mut seen = HashSet::new();

    for (idx, obstacle) in blueprint.scene.obstacles.iter().enumerate() {
        if obstacle.id.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("scene.obstacles[{}].id", idx),
                "obstacle id cannot be empty",
            ));
        }
        if !seen.insert(obstacle.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("scene.obstacles[id={}]", obstacle.id),
                "duplicate obstacle id",
            ));
        }
        if let Some(owner) = &obstacle.owner {
            if !sensor_ids.contains(owner.as_str()) {
                return Err(ContractError::config_validation(
                    format!("scene.obstacles[{}].owner", obstacle.id),
                    format!("owner '{}' not found in sensors", owner),
                ));
            }
        }
    }
    Ok(())
}

/// sink 名称唯一；网络 sink 需要 addr
fn validate_sinks(blueprint: &SimBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.sink_type.needs_addr() {
            let addr = sink.params.get("addr").ok_or_else(|| {
                ContractError::config_validation(
                    format!("sinks[{}].params.addr", sink.name),
                    "addr is required for udp/tcp sinks",
                )
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation(
                    format!("sinks[{}].params.addr", sink.name),
                    format!("invalid address '{}': {}", addr, e),
                )
            })?;
        }
    }
    Ok(())
}
