//! RegistryConfig - ストライプ数と初期容量の設定

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Default number of buckets in a fresh table.
pub const DEFAULT_CAPACITY: usize = 31;

/// Upper bound on the number of stripe locks when the lock array grows.
pub const MAX_STRIPES: usize = 1024;

/// Sizing of a concurrent registry.
///
/// Deserializes from JSON with every field optional:
/// ```json
/// { "concurrency_level": 8, "capacity": 64, "grow_lock_array": false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Estimated number of concurrent writers; one stripe lock each.
    /// `None` uses the available hardware parallelism.
    pub concurrency_level: Option<usize>,

    /// Initial bucket count. Raised to the concurrency level when smaller.
    pub capacity: usize,

    /// Whether resizes may also double the stripe locks (up to `MAX_STRIPES`).
    pub grow_lock_array: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            concurrency_level: None,
            capacity: DEFAULT_CAPACITY,
            grow_lock_array: true,
        }
    }
}

impl RegistryConfig {
    pub fn with_concurrency_level(mut self, level: usize) -> Self {
        self.concurrency_level = Some(level);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_fixed_locks(mut self) -> Self {
        self.grow_lock_array = false;
        self
    }

    /// The stripe count this config resolves to.
    pub fn stripes(&self) -> Result<NonZeroUsize, RegistryError> {
        match self.concurrency_level {
            None => Ok(default_concurrency_level()),
            Some(level) => {
                NonZeroUsize::new(level).ok_or(RegistryError::InvalidConcurrencyLevel(level))
            }
        }
    }
}

pub(crate) fn default_concurrency_level() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// RegistryError はレジストリ構築時のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("concurrency level must be at least 1 (got {0})")]
    InvalidConcurrencyLevel(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_hardware() {
        let config = RegistryConfig::default();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert!(config.grow_lock_array);
        assert_eq!(config.stripes().unwrap(), default_concurrency_level());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = RegistryConfig::default().with_concurrency_level(0);
        assert_eq!(config.stripes(), Err(RegistryError::InvalidConcurrencyLevel(0)));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: RegistryConfig = serde_json::from_str(r#"{"capacity": 128}"#).unwrap();
        assert_eq!(config.capacity, 128);
        assert_eq!(config.concurrency_level, None);
        assert!(config.grow_lock_array);
    }
}
