//! Engine configuration, loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// When the state-machine engine evaluates `State` triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StateCheckPolicy {
    /// After event processing on every turn.
    #[default]
    EveryTurn,
    /// Only when the caller asks for it.
    Manual,
}

/// Configuration for one play session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Seed for the scheduler's random source.
    pub seed: u64,

    /// Maximum number of event passes per turn. Events emitted by effects are
    /// processed on the following pass; anything still pending after the last
    /// pass is dropped.
    /// Must be at least 1.
    pub max_event_passes: usize,

    pub state_check: StateCheckPolicy,

    /// State changes kept per machine instance, oldest dropped first. 0 keeps none.
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_event_passes: 8,
            state_check: StateCheckPolicy::EveryTurn,
            history_limit: 32,
        }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string. Missing keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_event_passes == 0 {
            return Err(ConfigError::Invalid("max_event_passes must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
