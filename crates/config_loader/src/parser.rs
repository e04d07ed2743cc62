//! 反序列化蓝图文本。缺省字段由 `contracts` 里的 serde 默认值补齐。

use contracts::{ContractError, SimBlueprint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Case-insensitive; `None` for anything but `toml` / `json`
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

fn parse_error<E>(format: ConfigFormat) -> impl FnOnce(E) -> ContractError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| ContractError::ConfigParse {
        message: format!("{} parse error: {e}", format.label()),
        source: Some(Box::new(e)),
    }
}

pub fn parse_toml(content: &str) -> Result<SimBlueprint, ContractError> {
    toml::from_str(content).map_err(parse_error(ConfigFormat::Toml))
}

pub fn parse_json(content: &str) -> Result<SimBlueprint, ContractError> {
    serde_json::from_str(content).map_err(parse_error(ConfigFormat::Json))
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<SimBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RotationDirection, ShapeConfig, SinkType};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[[sensors]]
id = "front"
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.sensors.len(), 1);
        assert_eq!(bp.simulation.step_hz, 100.0);
        assert!(bp.sensors[0].enabled);
        assert_eq!(bp.sensors[0].scan.frame_id, "laser");
        assert!(bp.sinks.is_empty());
    }

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
version = "V1"

[simulation]
step_hz = 50.0
duration_sec = 2.5
realtime = false

[[sensors]]
id = "front"
[sensors.mount.location]
x = 0.5
z = 0.3
[sensors.scan]
field_of_view_deg = 270.0
scan_rate_hz = 15.0
rotation_direction = "cw"
noise_std_dev = 0.01

[[scene.obstacles]]
id = "wall"
shape = { kind = "box", half_extents = [0.1, 4.0, 1.0] }
transform = { location = { x = 3.0 } }

[[scene.obstacles]]
id = "pillar"
shape = { kind = "cylinder", half_height = 1.0, radius = 0.2 }
layers = 2

[[sinks]]
name = "out"
sink_type = "udp"
queue_capacity = 8
params = { addr = "127.0.0.1:7000" }
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.simulation.duration_sec, Some(2.5));
        assert!(!bp.simulation.realtime);
        assert_eq!(bp.sensors[0].mount.location.x, 0.5);
        assert_eq!(bp.sensors[0].scan.rotation_direction, RotationDirection::Cw);
        assert_eq!(bp.scene.obstacles.len(), 2);
        assert!(matches!(
            bp.scene.obstacles[1].shape,
            ShapeConfig::Cylinder { radius, .. } if radius == 0.2
        ));
        assert_eq!(bp.scene.obstacles[1].layers, 2);
        assert_eq!(bp.sinks[0].sink_type, SinkType::Udp);
        assert_eq!(bp.sinks[0].params["addr"], "127.0.0.1:7000");
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "sensors": [{ "id": "front", "scan": { "points_per_scan": 45 } }],
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.sensors[0].scan.points_per_scan, Some(45));
        assert_eq!(bp.sinks[0].queue_capacity, 100);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { source: Some(_), .. }));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_format_from_extension() {
        for (ext, expected) in [
            ("toml", Some(ConfigFormat::Toml)),
            ("TOML", Some(ConfigFormat::Toml)),
            ("Json", Some(ConfigFormat::Json)),
            ("yaml", None),
        ] {
            assert_eq!(ConfigFormat::from_extension(ext), expected, "{ext}");
        }
    }
}
