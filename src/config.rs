//! Loading arenas from JSON
//!
//! A config document names its arena in an `env` field and carries that
//! arena's parameters next to it. Missing parameters take their defaults:
//!
//! ```json
//! { "env": "parking", "time_to_park": 60.0, "seed": 3 }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::env::games::{
    BalanceBoard, BalanceConfig, ChaseConfig, ChaseEnv, ParkingConfig, ParkingLot, PelletConfig,
    PelletGrabber,
};
use crate::env::Environment;

/// A single-agent arena behind a trait object
pub type DynEnv = Box<dyn Environment<Observation = Vec<f32>, Action = Vec<f32>> + Send>;

/// Configuration for any of the arenas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "env", rename_all = "snake_case")]
pub enum ArenaConfig {
    Balance(BalanceConfig),
    Parking(ParkingConfig),
    Pellet(PelletConfig),
    Chase(ChaseConfig),
}

/// A built arena
pub enum Arena {
    Solo(DynEnv),
    Chase(ChaseEnv),
}

impl ArenaConfig {
    /// Parse and validate a config document
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("invalid arena config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Name of the arena, as written in the `env` field
    pub fn name(&self) -> &'static str {
        match self {
            Self::Balance(_) => "balance",
            Self::Parking(_) => "parking",
            Self::Pellet(_) => "pellet",
            Self::Chase(_) => "chase",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Balance(config) => config.validate(),
            Self::Parking(config) => config.validate(),
            Self::Pellet(config) => config.validate(),
            Self::Chase(config) => config.validate(),
        }
    }

    /// Override the seed of whichever arena this is
    pub fn with_seed(self, seed: u64) -> Self {
        match self {
            Self::Balance(config) => Self::Balance(config.seed(seed)),
            Self::Parking(config) => Self::Parking(config.seed(seed)),
            Self::Pellet(config) => Self::Pellet(config.seed(seed)),
            Self::Chase(config) => Self::Chase(config.seed(seed)),
        }
    }

    pub fn build(self) -> Result<Arena> {
        tracing::debug!(env = self.name(), "building arena");
        Ok(match self {
            Self::Balance(config) => Arena::Solo(Box::new(BalanceBoard::build(config)?)),
            Self::Parking(config) => Arena::Solo(Box::new(ParkingLot::build(config)?)),
            Self::Pellet(config) => Arena::Solo(Box::new(PelletGrabber::build(config)?)),
            Self::Chase(config) => Arena::Chase(ChaseEnv::build(config)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = ArenaConfig::from_json(r#"{ "env": "parking", "time_to_park": 60.0 }"#)
            .unwrap();
        let expected = ParkingConfig::new().time_to_park(60.0);
        assert_eq!(config, ArenaConfig::Parking(expected));
    }

    #[test]
    fn test_unknown_env_is_rejected() {
        assert!(ArenaConfig::from_json(r#"{ "env": "snake" }"#).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ArenaConfig::from_json(r#"{ "env": "balance", "time_limit": -1.0 }"#)
            .unwrap_err();
        assert!(err.to_string().contains("time_limit"));
    }

    #[test]
    fn test_json_round_trip() {
        let config = ArenaConfig::Pellet(PelletConfig::new().seed(9));
        let text = config.to_json().unwrap();
        assert!(text.contains("\"env\": \"pellet\""));
        assert_eq!(ArenaConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_with_seed() {
        let config = ArenaConfig::Chase(ChaseConfig::new()).with_seed(4);
        assert_eq!(config, ArenaConfig::Chase(ChaseConfig::new().seed(4)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "env": "balance", "rotate_speed": 50.0 }}"#).unwrap();

        let config = ArenaConfig::from_file(file.path()).unwrap();
        assert_eq!(config, ArenaConfig::Balance(BalanceConfig::new().rotate_speed(50.0)));
    }

    #[test]
    fn test_from_missing_file() {
        assert!(ArenaConfig::from_file("/nonexistent/arena.json").is_err());
    }

    #[test]
    fn test_build_every_arena() {
        for text in [r#"{"env":"balance"}"#, r#"{"env":"parking"}"#, r#"{"env":"pellet"}"#] {
            match ArenaConfig::from_json(text).unwrap().build().unwrap() {
                Arena::Solo(mut env) => {
                    let obs = env.reset().unwrap();
                    assert_eq!(obs.len(), env.observation_space().shape[0]);
                }
                Arena::Chase(_) => panic!("{text} built a chase arena"),
            }
        }
        let chase = ArenaConfig::from_json(r#"{"env":"chase"}"#).unwrap().build().unwrap();
        assert!(matches!(chase, Arena::Chase(_)));
    }
}
