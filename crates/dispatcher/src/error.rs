use contracts::ContractError;
use thiserror::Error;

/// Failure while assembling the dispatcher's sinks
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A sink's parameters were rejected or its endpoint could not be opened
    #[error("failed to create sink '{name}': {source}")]
    SinkCreation {
        name: String,
        #[source]
        source: ContractError,
    },
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, source: ContractError) -> Self {
        Self::SinkCreation {
            name: name.into(),
            source,
        }
    }
}
