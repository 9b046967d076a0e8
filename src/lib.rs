//! # Arena RL
//!
//! Reinforcement-learning arenas on a small kinematic physics world
//!
//! Every arena runs the same agent loop: act, advance the world one tick,
//! turn contacts into termination events and rewards. Four arenas ship with
//! the crate:
//!
//! - **balance**: tilt a board to keep two balls on it
//! - **parking**: drive a car into a bay without hitting anything
//! - **pellet**: collect every pellet before touching a wall
//! - **chase**: a cat and a mouse sharing one arena
//!
//! ## Quick Start
//!
//! ```rust
//! use arena_rl::prelude::*;
//!
//! let mut env = PelletGrabber::build(PelletConfig::new().seed(7)).unwrap();
//! let mut source = ConstantAction(vec![0.0, 1.0]);
//! let summary = run_episode(&mut env, &mut source, 10_000).unwrap();
//! assert_eq!(summary.outcome(), Some(Outcome::Failure));
//! ```

#![warn(clippy::all)]

/// Environment traits, the agent loop and the arenas
pub mod env;

/// Rigid bodies, contacts and the kinematic world
pub mod physics;

/// Driving environments with scripted or random actions
pub mod rollout;

/// Arena configuration files
pub mod config;

/// Utility functions and helpers
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Arena, ArenaConfig, DynEnv};
    pub use crate::env::games::{
        BalanceBoard, BalanceConfig, ChaseConfig, ChaseEnv, ParkingConfig, ParkingLot,
        PelletConfig, PelletGrabber, Role,
    };
    pub use crate::env::pool::EnvPool;
    pub use crate::env::{
        Environment, EpisodePhase, Outcome, SpaceInfo, StepResult, TerminationCause,
    };
    pub use crate::physics::{KinematicWorld, World};
    pub use crate::rollout::{
        run_chase_episode, run_episode, run_episodes, ActionSource, ConstantAction,
        EpisodeSummary, HeuristicSource, RolloutStats, UniformRandom,
    };
}

/// Current version of arena-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
