use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;

use crate::hardware::{Constraints, Facing};

pub const DEFAULT_PULSE_INTERVAL_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables of the torch controller. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorchConfig {
    /// Half-period of pulse mode: the torch flips every `pulse_interval_ms`.
    pub pulse_interval_ms: u64,
    pub facing: Facing,
    pub audio: bool,
}

impl Default for TorchConfig {
    fn default() -> Self {
        TorchConfig{pulse_interval_ms: DEFAULT_PULSE_INTERVAL_MS, facing: Facing::Environment, audio: false}
    }
}

impl TorchConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: TorchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pulse_interval_ms == 0 {
            return Err(ConfigError::Invalid("pulse_interval_ms must be greater than zero".to_string()));
        }
        Ok(())
    }

    pub fn pulse_interval(&self) -> Duration {
        Duration::from_millis(self.pulse_interval_ms.max(1))
    }

    pub fn constraints(&self) -> Constraints {
        Constraints{facing: self.facing, audio: self.audio}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        let config = TorchConfig::from_json("{}").unwrap();
        assert_eq!(config, TorchConfig::default());
        assert_eq!(config.pulse_interval(), Duration::from_millis(100));
        assert_eq!(config.constraints(), Constraints{facing: Facing::Environment, audio: false});
    }

    #[test]
    fn overrides_fields() {
        let config = TorchConfig::from_json(r#"{"pulse_interval_ms": 250, "facing": "user"}"#).unwrap();
        assert_eq!(config.pulse_interval(), Duration::from_millis(250));
        assert_eq!(config.facing, Facing::User);
        assert!(!config.audio);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = TorchConfig::from_json(r#"{"pulse_interval_ms": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("penlight.json");
        std::fs::write(&path, r#"{"audio": true}"#).unwrap();
        assert!(TorchConfig::load(&path).unwrap().audio);
        assert!(matches!(TorchConfig::load(dir.path().join("missing.json")), Err(ConfigError::Io(_))));
    }
}
