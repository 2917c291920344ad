//! YAML configuration for a game: curve parameters, session rules and rush
//! playback timing. Every section is optional and falls back to defaults.

use crate::rush::RushConfig;
use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};
use sim_core::{validate_params, CurveParameters, ValidationError};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub params: CurveParameters,
    pub session: SessionConfig,
    pub rush: RushConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid curve parameters: {0}")]
    Params(#[from] ValidationError),
    #[error("invalid session rules: {0}")]
    Session(String),
    #[error("invalid rush timing: {0}")]
    Rush(String),
}

impl GameConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: GameConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_params(&self.params)?;
        let s = &self.session;
        if s.rounds_per_episode == 0 {
            return Err(ConfigError::Session("rounds_per_episode must be > 0".into()));
        }
        if s.losses_before_taunt == 0 {
            return Err(ConfigError::Session("losses_before_taunt must be > 0".into()));
        }
        let sliders = [s.initial_quality, s.initial_advertising, s.initial_output];
        if sliders.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::Session(
                "initial sliders must be finite and >= 0".into(),
            ));
        }
        if !(s.perfect_pour_tolerance.is_finite() && s.perfect_pour_tolerance >= 0.0) {
            return Err(ConfigError::Session(
                "perfect_pour_tolerance must be finite and >= 0".into(),
            ));
        }
        if self.rush.step_ms == 0 {
            return Err(ConfigError::Rush("step_ms must be > 0".into()));
        }
        Ok(())
    }
}
