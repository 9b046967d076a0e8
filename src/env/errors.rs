use thiserror::Error;

use crate::physics::BodyId;

/// Contract violations raised by the agent loops
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("step called before the first reset")]
    NotStarted,

    #[error("episode {episode} has ended; reset before stepping again")]
    EpisodeOver { episode: usize },

    #[error("no agent in this arena has a running episode")]
    NoActiveAgent,

    #[error("action has {actual} components, expected {expected}")]
    ActionShape { expected: usize, actual: usize },

    #[error("observation has {actual} features, expected {expected}")]
    ObservationShape { expected: usize, actual: usize },

    #[error("required body {0:?} does not exist in the world")]
    MissingBody(BodyId),

    #[error("body {0:?} is claimed by more than one agent")]
    SharedOwnership(BodyId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
