//! # Config Loader
//!
//! 从 TOML / JSON 读取仿真蓝图 [`SimBlueprint`]。
//!
//! 加载分两步：反序列化（缺省字段取默认值），然后做结构校验（id 唯一、
//! 步进频率为正、sink 参数齐全等）。扫描参数越界不算错误，它们在传感器
//! 构建时会被钳制，这里只把将要发生的钳制作为 [`ConfigWarning`] 报告出来。
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let loaded = ConfigLoader::load_with_warnings(Path::new("lidar.toml")).unwrap();
//! for warning in &loaded.warnings {
//!     eprintln!("clamped: {warning}");
//! }
//! println!("sensors: {}", loaded.blueprint.sensors.len());
//! ```

mod parser;
mod validator;

pub use contracts::SimBlueprint;
pub use parser::ConfigFormat;
pub use validator::ConfigWarning;

use contracts::ContractError;
use std::path::Path;

/// Blueprint that passed validation, with the clamping its sensors will undergo
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub blueprint: SimBlueprint,
    pub warnings: Vec<ConfigWarning>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Read and validate a blueprint; `.toml` and `.json` are recognised
    pub fn load_from_path(path: &Path) -> Result<SimBlueprint, ContractError> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<SimBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    pub fn load_with_warnings(path: &Path) -> Result<LoadedConfig, ContractError> {
        let blueprint = Self::load_from_path(path)?;
        Ok(LoadedConfig {
            warnings: Self::warnings(&blueprint),
            blueprint,
        })
    }

    /// Scan parameters that sensor construction will clamp
    pub fn warnings(blueprint: &SimBlueprint) -> Vec<ConfigWarning> {
        validator::collect_warnings(blueprint)
    }

    pub fn to_toml(blueprint: &SimBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint).map_err(|e| {
            ContractError::config_parse(format!("blueprint not representable as TOML: {e}"))
        })
    }

    pub fn to_json(blueprint: &SimBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint).map_err(|e| {
            ContractError::config_parse(format!("blueprint not representable as JSON: {e}"))
        })
    }
}

fn format_of(path: &Path) -> Result<ConfigFormat, ContractError> {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return Err(ContractError::config_parse(format!(
            "{} has no file extension to infer the format from",
            path.display()
        )));
    };

    ConfigFormat::from_extension(ext)
        .ok_or_else(|| ContractError::config_parse(format!("unsupported config format: .{ext}")))
}
