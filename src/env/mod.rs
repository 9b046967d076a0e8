//! Environment traits and implementations
//!
//! This module defines the core environment interface, the episodic agent
//! loop every arena is built on, and the built-in arenas.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Core trait for RL environments
pub trait Environment {
    /// Observation type
    type Observation;

    /// Action type
    type Action;

    /// Reset the environment and return initial observation
    fn reset(&mut self) -> Result<Self::Observation>;

    /// Step the environment with an action
    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>>;

    /// Get the observation space dimensions
    fn observation_space(&self) -> SpaceInfo;

    /// Get the action space dimensions
    fn action_space(&self) -> SpaceInfo;
}

/// Result of an environment step
#[derive(Debug, Clone)]
pub struct StepResult<O = Vec<f32>> {
    /// Next observation
    pub observation: O,

    /// Reward received
    pub reward: f32,

    /// Whether the episode ended on a failure or success event
    pub terminated: bool,

    /// Whether the episode ended because its time ran out
    pub truncated: bool,

    /// Additional info
    pub info: StepInfo,
}

impl<O> StepResult<O> {
    /// Whether the caller has to reset before stepping again
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Space information for observations and actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Data type
    pub dtype: SpaceType,
}

/// Space data types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpaceType {
    /// Continuous box with per-component bounds
    Bounded { low: Vec<f32>, high: Vec<f32> },

    /// Continuous values without declared bounds
    Unbounded,
}

/// Additional step information
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepInfo {
    /// Index of the episode this step belongs to (first episode is 1)
    pub episode: usize,

    /// Ticks taken in this episode, including this one
    pub steps: usize,

    /// Simulated seconds since reset
    pub elapsed: f32,

    /// Reward accumulated since reset, including this step
    pub cumulative_reward: f32,

    /// Why the episode ended, when it did
    pub cause: Option<TerminationCause>,

    /// Feedback signal emitted this step
    pub signal: Option<Signal>,
}

pub mod action;
pub mod agent_loop;
pub mod episode;
pub mod errors;
pub mod feedback;
pub mod games;
pub mod pool;
pub mod spawn;
pub mod termination;

pub use action::{ActionRange, ActionSpec, Heuristic, ManualInput};
pub use agent_loop::{AgentLoop, Scenario, SoloEnv};
pub use episode::{Episode, EpisodePhase};
pub use errors::EnvError;
pub use feedback::{FeedbackSink, NullFeedback, RecordingFeedback, Signal};
pub use termination::{Outcome, Termination, TerminationCause, TimeoutPolicy, Verdict};
