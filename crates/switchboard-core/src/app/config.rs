//! MessagingConfig - JSON から読み込むバスの設定
//!
//! ```json
//! {
//!   "registry": { "concurrency_level": 8, "capacity": 64 },
//!   "command_bus": { "duplicate_policy": "reject" }
//! }
//! ```
//!
//! すべてのフィールドは省略可能です。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bus::CommandBusBuilder;
use crate::impls::{LogAndOverride, RejectDuplicates, SilentOverride};
use crate::registry::RegistryConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub registry: RegistryConfig,
    pub command_bus: CommandBusConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandBusConfig {
    pub duplicate_policy: DuplicatePolicy,
}

/// Built-in duplicate handler policies, by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    SilentOverride,
    LogAndOverride,
    Reject,
}

impl DuplicatePolicy {
    /// Installs the matching resolver on `builder`.
    pub fn configure(self, builder: CommandBusBuilder) -> CommandBusBuilder {
        match self {
            Self::SilentOverride => builder.duplicate_resolver(SilentOverride),
            Self::LogAndOverride => builder.duplicate_resolver(LogAndOverride),
            Self::Reject => builder.duplicate_resolver(RejectDuplicates),
        }
    }
}

/// ConfigError は設定読み込み時のエラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl MessagingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}
