//! Driving environments with a policy
//!
//! [`ActionSource`] stands in for the policy/trainer: it picks an action from
//! each observation and sees every step result. [`run_episode`] plays one
//! episode from reset to termination and [`RolloutStats`] aggregates many.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::env::games::{ChaseEnv, Role};
use crate::env::{
    ActionSpec, Environment, EpisodePhase, Heuristic, ManualInput, Outcome, SpaceInfo, StepResult,
    TerminationCause,
};
use crate::physics::World;

/// Supplies actions and consumes step results
pub trait ActionSource {
    fn act(&mut self, observation: &[f32]) -> Vec<f32>;

    /// Called with every step result, including the terminal one
    fn observe(&mut self, _result: &StepResult<Vec<f32>>) {}
}

/// Always the same action
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantAction(pub Vec<f32>);

impl ActionSource for ConstantAction {
    fn act(&mut self, _observation: &[f32]) -> Vec<f32> {
        self.0.clone()
    }
}

/// Samples every component uniformly from its declared range
#[derive(Debug, Clone)]
pub struct UniformRandom {
    spec: ActionSpec,
    rng: StdRng,
}

impl UniformRandom {
    pub fn new(spec: ActionSpec, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self { spec, rng }
    }

    /// Sample from a bounded action space as reported by an environment
    pub fn for_space(space: &SpaceInfo, seed: Option<u64>) -> Result<Self> {
        let spec = ActionSpec::from_space_info(space)?
            .ok_or_else(|| anyhow!("cannot sample uniformly from an unbounded action space"))?;
        Ok(Self::new(spec, seed))
    }
}

impl ActionSource for UniformRandom {
    fn act(&mut self, _observation: &[f32]) -> Vec<f32> {
        self.spec
            .ranges()
            .iter()
            .map(|range| {
                if range.low < range.high {
                    self.rng.gen_range(range.low..=range.high)
                } else {
                    range.low
                }
            })
            .collect()
    }
}

/// Replays scripted manual input through a scenario's heuristic
///
/// After the script runs out the last input is held.
#[derive(Debug, Clone)]
pub struct HeuristicSource<H> {
    heuristic: H,
    script: Vec<ManualInput>,
    cursor: usize,
}

impl<H: Heuristic> HeuristicSource<H> {
    pub fn from_script(heuristic: H, script: Vec<ManualInput>) -> Self {
        Self { heuristic, script, cursor: 0 }
    }

    /// Start the script over
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

impl<H: Heuristic> ActionSource for HeuristicSource<H> {
    fn act(&mut self, _observation: &[f32]) -> Vec<f32> {
        let input =
            self.script.get(self.cursor).or(self.script.last()).copied().unwrap_or_default();
        self.cursor += 1;
        self.heuristic.heuristic(&input)
    }
}

/// What happened in one episode
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub ticks: usize,
    pub total_reward: f32,
    pub elapsed: f32,

    /// `None` when the tick budget ran out first
    pub cause: Option<TerminationCause>,
}

impl EpisodeSummary {
    pub fn outcome(&self) -> Option<Outcome> {
        self.cause.map(TerminationCause::outcome)
    }

    fn record(&mut self, result: &StepResult<Vec<f32>>) {
        self.ticks += 1;
        self.total_reward += result.reward;
        self.elapsed = result.info.elapsed;
        if result.done() {
            self.cause = result.info.cause;
        }
    }
}

/// Play one episode, stopping early after `max_ticks`
pub fn run_episode<E, A>(env: &mut E, source: &mut A, max_ticks: usize) -> Result<EpisodeSummary>
where
    E: Environment<Observation = Vec<f32>, Action = Vec<f32>> + ?Sized,
    A: ActionSource + ?Sized,
{
    let mut observation = env.reset()?;
    let mut summary = EpisodeSummary::default();

    while summary.ticks < max_ticks {
        let action = source.act(&observation);
        let result = env.step(action)?;
        source.observe(&result);
        summary.record(&result);

        if result.done() {
            break;
        }
        observation = result.observation;
    }

    Ok(summary)
}

/// Play `episodes` episodes and aggregate them
pub fn run_episodes<E, A>(
    env: &mut E,
    source: &mut A,
    episodes: usize,
    max_ticks: usize,
) -> Result<RolloutStats>
where
    E: Environment<Observation = Vec<f32>, Action = Vec<f32>> + ?Sized,
    A: ActionSource + ?Sized,
{
    let mut stats = RolloutStats::new();
    for _ in 0..episodes {
        let summary = run_episode(env, source, max_ticks)?;
        tracing::debug!(
            ticks = summary.ticks,
            reward = summary.total_reward,
            cause = ?summary.cause,
            "episode finished"
        );
        stats.add(&summary);
    }
    tracing::info!(
        episodes = stats.episodes,
        average_reward = stats.average_reward(),
        success_rate = stats.success_rate(),
        "rollout finished"
    );
    Ok(stats)
}

/// Per-agent summaries of one chase episode
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChaseSummary {
    pub cat: EpisodeSummary,
    pub mouse: EpisodeSummary,
}

/// Reset both agents and play until neither is running or `max_ticks` pass
///
/// An agent whose episode ends sits out the rest of the run.
pub fn run_chase_episode<W, C, M>(
    env: &mut ChaseEnv<W>,
    cat: &mut C,
    mouse: &mut M,
    max_ticks: usize,
) -> Result<ChaseSummary>
where
    W: World,
    C: ActionSource + ?Sized,
    M: ActionSource + ?Sized,
{
    let first = env.reset()?;
    let (mut cat_obs, mut mouse_obs) = (first.cat, first.mouse);
    let mut summary = ChaseSummary::default();

    for _ in 0..max_ticks {
        let running = |role| env.phase(role) == EpisodePhase::Running;
        if !running(Role::Cat) && !running(Role::Mouse) {
            break;
        }
        let step = env.step(&cat.act(&cat_obs), &mouse.act(&mouse_obs))?;
        if let Some(result) = step.cat {
            cat.observe(&result);
            summary.cat.record(&result);
            cat_obs = result.observation;
        }
        if let Some(result) = step.mouse {
            mouse.observe(&result);
            summary.mouse.record(&result);
            mouse_obs = result.observation;
        }
    }

    Ok(summary)
}

/// Aggregate over many episodes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RolloutStats {
    pub episodes: usize,
    pub total_ticks: usize,
    pub total_reward: f32,
    pub successes: usize,
    pub failures: usize,
    pub timeouts: usize,

    /// Episodes that hit the tick budget without terminating
    pub unfinished: usize,
}

impl RolloutStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, summary: &EpisodeSummary) {
        self.episodes += 1;
        self.total_ticks += summary.ticks;
        self.total_reward += summary.total_reward;
        match summary.outcome() {
            Some(Outcome::Success) => self.successes += 1,
            Some(Outcome::Failure) => self.failures += 1,
            Some(Outcome::Timeout) => self.timeouts += 1,
            None => self.unfinished += 1,
        }
    }

    /// Mean episode reward
    pub fn average_reward(&self) -> f32 {
        if self.episodes == 0 {
            return 0.0;
        }
        self.total_reward / self.episodes as f32
    }

    /// Mean episode length in ticks
    pub fn average_ticks(&self) -> f32 {
        if self.episodes == 0 {
            return 0.0;
        }
        self.total_ticks as f32 / self.episodes as f32
    }

    pub fn success_rate(&self) -> f32 {
        if self.episodes == 0 {
            return 0.0;
        }
        self.successes as f32 / self.episodes as f32
    }
}
