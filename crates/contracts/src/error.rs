//! 跨 crate 共享的错误类型。
//!
//! 配置、线格式、射线环境与 sink 四类来源各自对应一组变体。

use thiserror::Error;

use crate::wire::WireError;

#[derive(Debug, Error)]
pub enum ContractError {
    /// TOML / JSON could not be deserialized into a blueprint
    #[error("cannot parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A field holds a value no clamping can repair
    #[error("invalid configuration at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// A scan was requested while the sensor had no environment to cast against
    #[error("no ray-cast environment bound to sensor '{sensor_id}'")]
    EnvironmentUnavailable { sensor_id: String },

    #[error("sink '{sink_name}' failed to write: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Endpoint unreachable or parameters unusable at sink construction
    #[error("sink '{sink_name}' cannot reach its endpoint: {message}")]
    SinkConnection { sink_name: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
