//! The episodic agent loop
//!
//! Every arena follows the same pattern: reset, observe, act, reward,
//! terminate. [`AgentLoop`] owns that state machine and delegates the parts
//! that differ between arenas to a [`Scenario`].
//!
//! A tick is split in two so several agents can share one world:
//!
//! ```text
//! begin_tick (clamp, apply) -> World::advance -> finish_tick (predicates, reward, observe)
//! ```
//!
//! [`SoloEnv`] wires one loop to one world and implements [`Environment`].

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{
    ActionSpec, EnvError, Environment, Episode, EpisodePhase, FeedbackSink, Heuristic, ManualInput,
    NullFeedback, Outcome, Signal, SpaceInfo, SpaceType, StepInfo, StepResult, Termination,
    TerminationCause, TimeoutPolicy, Verdict,
};
use crate::physics::{BodyId, ContactEvent, KinematicWorld, World};

/// Arena-specific hooks driven by [`AgentLoop`]
pub trait Scenario {
    /// Shape and ranges of the action vector
    fn action_spec(&self) -> &ActionSpec;

    /// Length of the observation vector
    fn observation_len(&self) -> usize;

    /// Reward added on every tick that does not end the episode
    fn shaping_reward(&self) -> f32 {
        0.0
    }

    fn timeout(&self) -> TimeoutPolicy {
        TimeoutPolicy::Disabled
    }

    /// Bodies this agent moves on reset; no other agent may claim them
    fn owned_bodies(&self) -> Vec<BodyId>;

    /// Bodies that must exist for the scenario to work
    fn required_bodies(&self) -> Vec<BodyId> {
        self.owned_bodies()
    }

    /// Put owned bodies back to their initial (or freshly sampled) state
    fn reset<W: World>(&mut self, world: &mut W, rng: &mut StdRng);

    /// Turn an already clamped action into requests on the world
    fn apply<W: World>(&mut self, world: &mut W, action: &[f32], delta_time: f32);

    /// Inspect this tick's contact events and the world state
    fn evaluate<W: World>(&mut self, world: &mut W, events: &[ContactEvent], verdict: &mut Verdict);

    /// Clean up after a predicate ended the episode
    fn conclude<W: World>(&mut self, _world: &mut W, _termination: &Termination) {}

    fn observe<W: World>(&self, world: &W) -> Vec<f32>;
}

/// Episode state machine around a [`Scenario`]
pub struct AgentLoop<S> {
    scenario: S,
    episode: Episode,
    rng: StdRng,
    feedback: Box<dyn FeedbackSink>,
}

impl<S: Scenario> AgentLoop<S> {
    /// Wrap `scenario`, checking that every body it needs exists in `world`
    ///
    /// A missing body is a configuration error and is reported here rather
    /// than discovered mid-episode.
    pub fn new<W: World>(scenario: S, world: &W, seed: Option<u64>) -> Result<Self, EnvError> {
        if let Some(&missing) = scenario.required_bodies().iter().find(|&&id| !world.contains(id)) {
            return Err(EnvError::MissingBody(missing));
        }
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Ok(Self { scenario, episode: Episode::new(), rng, feedback: Box::new(NullFeedback) })
    }

    /// Route feedback signals to `sink`
    pub fn with_feedback(mut self, sink: impl FeedbackSink + 'static) -> Self {
        self.feedback = Box::new(sink);
        self
    }

    pub fn scenario(&self) -> &S {
        &self.scenario
    }

    pub fn scenario_mut(&mut self) -> &mut S {
        &mut self.scenario
    }

    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    pub fn phase(&self) -> EpisodePhase {
        self.episode.phase()
    }

    /// Start a new episode and return its first observation
    pub fn reset<W: World>(&mut self, world: &mut W) -> Result<Vec<f32>, EnvError> {
        self.scenario.reset(world, &mut self.rng);
        self.episode.begin();
        tracing::debug!(episode = self.episode.index(), "episode reset");
        self.observe(world)
    }

    /// Validate, clamp and apply `action` ahead of the world advancing
    pub fn begin_tick<W: World>(&mut self, world: &mut W, action: &[f32]) -> Result<(), EnvError> {
        self.episode.ensure_running()?;
        let action = self.scenario.action_spec().clamp(action)?;
        let delta_time = world.delta_time();
        self.scenario.apply(world, &action, delta_time);
        Ok(())
    }

    /// Evaluate the tick the world just advanced through
    ///
    /// Predicates are resolved failure first, then success, then timeout. A
    /// failure tick pays only the failure reward; any other terminal tick pays
    /// its terminal reward plus that tick's event rewards; a non-terminal tick
    /// pays the shaping reward plus event rewards.
    pub fn finish_tick<W: World>(
        &mut self,
        world: &mut W,
        events: &[ContactEvent],
    ) -> Result<StepResult<Vec<f32>>, EnvError> {
        self.episode.ensure_running()?;
        self.episode.tick(world.delta_time());

        let mut verdict = Verdict::new();
        self.scenario.evaluate(world, events, &mut verdict);

        let elapsed = self.episode.elapsed();
        match self.scenario.timeout() {
            TimeoutPolicy::Terminal { limit, reward } if elapsed >= limit => {
                verdict.fire(TerminationCause::TimedOut, reward);
            }
            TimeoutPolicy::Cosmetic { limit } if elapsed >= limit => {
                verdict.signal(Signal::Success)
            }
            _ => {}
        }

        let winner = verdict.resolve();
        let reward = match winner {
            Some(t) if t.outcome() == Outcome::Failure => t.reward,
            Some(t) => t.reward + verdict.bonus(),
            None => self.scenario.shaping_reward() + verdict.bonus(),
        };
        self.episode.add_reward(reward);

        let mut signal = verdict.cosmetic_signal();
        if let Some(termination) = winner {
            self.scenario.conclude(world, &termination);
            self.episode.finish(termination.cause);
            signal = Some(Signal::from_outcome(termination.outcome()));
            tracing::debug!(
                episode = self.episode.index(),
                steps = self.episode.steps(),
                cause = ?termination.cause,
                total_reward = self.episode.reward(),
                "episode ended"
            );
        }
        if let Some(signal) = signal {
            self.feedback.signal(signal);
        }

        let outcome = winner.map(|t| t.outcome());
        Ok(StepResult {
            observation: self.observe(world)?,
            reward,
            terminated: matches!(outcome, Some(Outcome::Failure | Outcome::Success)),
            truncated: outcome == Some(Outcome::Timeout),
            info: StepInfo {
                episode: self.episode.index(),
                steps: self.episode.steps(),
                elapsed,
                cumulative_reward: self.episode.reward(),
                cause: self.episode.cause(),
                signal,
            },
        })
    }

    pub fn observation_space(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![self.scenario.observation_len()], dtype: SpaceType::Unbounded }
    }

    pub fn action_space(&self) -> SpaceInfo {
        self.scenario.action_spec().space_info()
    }

    fn observe<W: World>(&self, world: &W) -> Result<Vec<f32>, EnvError> {
        let observation = self.scenario.observe(world);
        let expected = self.scenario.observation_len();
        if observation.len() != expected {
            return Err(EnvError::ObservationShape { expected, actual: observation.len() });
        }
        Ok(observation)
    }
}

/// One agent alone in its own world
pub struct SoloEnv<S, W = KinematicWorld> {
    world: W,
    agent: AgentLoop<S>,
}

impl<S: Scenario, W: World> SoloEnv<S, W> {
    pub fn new(world: W, agent: AgentLoop<S>) -> Self {
        Self { world, agent }
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    /// Direct world access, for scripting situations in tests and demos
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn agent(&self) -> &AgentLoop<S> {
        &self.agent
    }

    pub fn scenario(&self) -> &S {
        self.agent.scenario()
    }

    pub fn episode(&self) -> &Episode {
        self.agent.episode()
    }

    pub fn with_feedback(mut self, sink: impl FeedbackSink + 'static) -> Self {
        self.agent = self.agent.with_feedback(sink);
        self
    }

    /// Step with a slice, without giving up ownership of the action
    pub fn step_slice(&mut self, action: &[f32]) -> Result<StepResult<Vec<f32>>, EnvError> {
        self.agent.begin_tick(&mut self.world, action)?;
        let events = self.world.advance();
        self.agent.finish_tick(&mut self.world, &events)
    }
}

impl<S: Scenario + Heuristic, W: World> SoloEnv<S, W> {
    /// Action a human would produce with `input`
    pub fn heuristic(&self, input: &ManualInput) -> Vec<f32> {
        self.agent.scenario().heuristic(input)
    }
}

impl<S: Scenario, W: World> Environment for SoloEnv<S, W> {
    type Observation = Vec<f32>;
    type Action = Vec<f32>;

    fn reset(&mut self) -> Result<Self::Observation> {
        Ok(self.agent.reset(&mut self.world)?)
    }

    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>> {
        Ok(self.step_slice(&action)?)
    }

    fn observation_space(&self) -> SpaceInfo {
        self.agent.observation_space()
    }

    fn action_space(&self) -> SpaceInfo {
        self.agent.action_space()
    }
}
