//! ---
//! dcp_section: "08-energy-models-optimization"
//! dcp_subsection: "module"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Power string balancing and failure-impact routines."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use thiserror::Error;

use crate::model::StringId;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid redundancy spec '{spec}': {reason}")]
    InvalidRedundancy { spec: String, reason: String },
    #[error("redundancy requires at least one live string")]
    NoLiveStrings,
    #[error("consumer id '{0}' appears more than once")]
    DuplicateConsumer(String),
    #[error("consumer '{id}' is invalid: {reason}")]
    InvalidConsumer { id: String, reason: String },
    #[error("string {0} is outside the configured topology")]
    UnknownString(StringId),
    #[error("invalid plant input: {0}")]
    InvalidPlant(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerializationFailed(#[from] serde_json::Error),
    #[error("yaml serialization error: {0}")]
    YamlSerializationFailed(#[from] serde_yaml::Error),
}

impl EngineError {
    /// Whether the error stems from caller input rather than the environment.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRedundancy { .. }
                | EngineError::NoLiveStrings
                | EngineError::DuplicateConsumer(_)
                | EngineError::InvalidConsumer { .. }
                | EngineError::UnknownString(_)
                | EngineError::InvalidPlant(_)
        )
    }
}
