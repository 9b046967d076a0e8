//! Pellet grabber
//!
//! An agent in a walled square collects pellets that are scattered fresh at
//! the start of every episode.
//!
//! - Observation (3): agent position in the arena frame
//! - Action (2): `[rotate, forward]` in `[-1, 1]`
//! - Reward: `+10` per pellet, `+5` more for the last one (success), `-15`
//!   for touching a wall (failure) and `-15` when time runs out

use anyhow::{anyhow, Result};
use glam::Vec3;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::env::spawn::{scatter, ScatterArea};
use crate::env::{
    ActionRange, ActionSpec, AgentLoop, EnvError, Heuristic, ManualInput, Scenario, SoloEnv,
    Termination, TerminationCause, TimeoutPolicy, Verdict,
};
use crate::physics::{
    yaw, BodyId, BodySpec, ContactEvent, ContactKind, KinematicWorld, Pose, Tag, World,
};

/// Pellet grabber environment
pub type PelletEnv = SoloEnv<PelletGrabber>;

/// Pellet grabber parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PelletConfig {
    /// Forward speed in units per second; also the turn in degrees per tick
    pub move_speed: f32,

    /// Height of the agent and every pellet
    pub height: f32,

    /// Pellets are placed with x and z in `[-border, border]`
    pub border: f32,

    /// Inner faces of the walls sit at `±wall_distance`
    pub wall_distance: f32,

    pub pellet_count: usize,

    /// Minimum distance between pellets and from the agent's start
    pub min_separation: f32,

    /// Placement samples per pellet before settling for the best one
    pub max_attempts: usize,

    /// Seconds per episode
    pub time_for_episode: f32,

    pub pellet_reward: f32,
    /// Extra reward for collecting the last pellet
    pub completion_bonus: f32,
    pub wall_penalty: f32,
    pub timeout_penalty: f32,

    pub agent_radius: f32,
    pub pellet_radius: f32,

    /// Physics tick, seconds
    pub delta_time: f32,

    pub seed: Option<u64>,
}

impl Default for PelletConfig {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            height: 0.25,
            border: 4.75,
            wall_distance: 5.75,
            pellet_count: 5,
            min_separation: 1.5,
            max_attempts: 64,
            time_for_episode: 30.0,
            pellet_reward: 10.0,
            completion_bonus: 5.0,
            wall_penalty: -15.0,
            timeout_penalty: -15.0,
            agent_radius: 0.25,
            pellet_radius: 0.2,
            delta_time: 0.02,
            seed: None,
        }
    }
}

impl PelletConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.pellet_count == 0 {
            return Err(anyhow!("pellet_count must be at least 1"));
        }
        if self.move_speed <= 0.0 {
            return Err(anyhow!("move_speed must be positive"));
        }
        if self.border <= 0.0 {
            return Err(anyhow!("border must be positive"));
        }
        if self.wall_distance <= self.border + self.pellet_radius {
            return Err(anyhow!("walls must lie outside the pellet area"));
        }
        if self.min_separation < 0.0 {
            return Err(anyhow!("min_separation must be non-negative"));
        }
        if self.time_for_episode <= 0.0 {
            return Err(anyhow!("time_for_episode must be positive"));
        }
        if self.delta_time <= 0.0 {
            return Err(anyhow!("delta_time must be positive"));
        }
        Ok(())
    }

    pub fn pellet_count(mut self, count: usize) -> Self {
        self.pellet_count = count;
        self
    }

    pub fn min_separation(mut self, distance: f32) -> Self {
        self.min_separation = distance;
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn time_for_episode(mut self, seconds: f32) -> Self {
        self.time_for_episode = seconds;
        self
    }

    pub fn delta_time(mut self, seconds: f32) -> Self {
        self.delta_time = seconds;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn start(&self) -> Vec3 {
        Vec3::new(0.0, self.height, 0.0)
    }
}

/// Pellet grabber scenario
#[derive(Debug, Clone)]
pub struct PelletGrabber {
    config: PelletConfig,
    agent: BodyId,
    walls: Vec<BodyId>,
    /// Pellets still in play this episode
    pellets: Vec<BodyId>,
    /// Placement fallbacks in the latest reset
    fallbacks: usize,
    spec: ActionSpec,
}

impl PelletGrabber {
    pub fn new<W: World>(
        config: PelletConfig,
        world: &W,
        agent: BodyId,
        walls: Vec<BodyId>,
    ) -> Result<Self> {
        if let Some(&missing) = walls.iter().chain([&agent]).find(|&&id| !world.contains(id)) {
            return Err(EnvError::MissingBody(missing).into());
        }
        Ok(Self {
            config,
            agent,
            walls,
            pellets: Vec::new(),
            fallbacks: 0,
            spec: ActionSpec::uniform(2, ActionRange::SYMMETRIC),
        })
    }

    /// Build the agent and four trigger walls in a fresh world
    pub fn build(config: PelletConfig) -> Result<PelletEnv> {
        config.validate()?;
        let mut world = KinematicWorld::new(config.delta_time);

        let agent =
            world.spawn(BodySpec::sphere(Tag::Agent, config.agent_radius).at(config.start()));

        let thickness = 0.25;
        let offset = config.wall_distance + thickness;
        let span = config.wall_distance + 2.0 * thickness;
        let walls = [
            (Vec3::new(offset, config.height, 0.0), Vec3::new(thickness, 1.0, span)),
            (Vec3::new(-offset, config.height, 0.0), Vec3::new(thickness, 1.0, span)),
            (Vec3::new(0.0, config.height, offset), Vec3::new(span, 1.0, thickness)),
            (Vec3::new(0.0, config.height, -offset), Vec3::new(span, 1.0, thickness)),
        ]
        .into_iter()
        .map(|(position, half_extents)| {
            world.spawn(BodySpec::cuboid(Tag::Wall, half_extents).at(position).trigger())
        })
        .collect();

        let seed = config.seed;
        let scenario = Self::new(config, &world, agent, walls)?;
        let agent = AgentLoop::new(scenario, &world, seed)?;
        Ok(SoloEnv::new(world, agent))
    }

    pub fn agent(&self) -> BodyId {
        self.agent
    }

    /// Pellets not yet collected this episode
    pub fn pellets(&self) -> &[BodyId] {
        &self.pellets
    }

    /// Pellets that had to settle for a best-effort spot in the latest reset
    pub fn placement_fallbacks(&self) -> usize {
        self.fallbacks
    }

    pub fn config(&self) -> &PelletConfig {
        &self.config
    }

    fn clear_pellets<W: World>(&mut self, world: &mut W) {
        for pellet in self.pellets.drain(..) {
            world.despawn(pellet);
        }
    }
}

impl Scenario for PelletGrabber {
    fn action_spec(&self) -> &ActionSpec {
        &self.spec
    }

    fn observation_len(&self) -> usize {
        3
    }

    fn timeout(&self) -> TimeoutPolicy {
        TimeoutPolicy::Terminal {
            limit: self.config.time_for_episode,
            reward: self.config.timeout_penalty,
        }
    }

    fn owned_bodies(&self) -> Vec<BodyId> {
        let mut owned = vec![self.agent];
        owned.extend(&self.pellets);
        owned
    }

    fn required_bodies(&self) -> Vec<BodyId> {
        let mut required = vec![self.agent];
        required.extend(&self.walls);
        required
    }

    fn reset<W: World>(&mut self, world: &mut W, rng: &mut StdRng) {
        self.clear_pellets(world);

        let start = self.config.start();
        world.set_pose(self.agent, Pose::at(start));
        world.set_velocity(self.agent, Vec3::ZERO);

        let area = ScatterArea { half_extent: self.config.border, height: self.config.height };
        let placement = scatter(
            self.config.pellet_count,
            area,
            &[start],
            self.config.min_separation,
            self.config.max_attempts,
            rng,
        );
        self.fallbacks = placement.fallbacks;

        let pellet = BodySpec::sphere(Tag::Pellet, self.config.pellet_radius).trigger();
        self.pellets = placement
            .positions
            .into_iter()
            .map(|position| world.spawn(pellet.at(position)))
            .collect();
    }

    fn apply<W: World>(&mut self, world: &mut W, action: &[f32], _delta_time: f32) {
        let mut pose = world.pose(self.agent);
        world.set_velocity(self.agent, pose.forward() * action[1] * self.config.move_speed);

        // Turn rate is per tick, not per second
        pose.rotation = (pose.rotation * yaw(action[0] * self.config.move_speed)).normalize();
        world.set_pose(self.agent, pose);
    }

    fn evaluate<W: World>(
        &mut self,
        world: &mut W,
        events: &[ContactEvent],
        verdict: &mut Verdict,
    ) {
        let mut collected = 0;
        let mut hit_wall = false;

        for event in events.iter().filter(|e| e.is(ContactKind::TriggerEnter, self.agent)) {
            match event.other_tag {
                Tag::Pellet => {
                    if let Some(index) = self.pellets.iter().position(|&p| p == event.other) {
                        self.pellets.swap_remove(index);
                        world.despawn(event.other);
                        verdict.reward(self.config.pellet_reward);
                        collected += 1;
                    }
                }
                Tag::Wall => hit_wall = true,
                _ => {}
            }
        }

        if hit_wall {
            verdict.fire(TerminationCause::HitWall, self.config.wall_penalty);
        }
        if collected > 0 && self.pellets.is_empty() {
            verdict.fire(TerminationCause::AllPelletsCollected, self.config.completion_bonus);
        }
    }

    fn conclude<W: World>(&mut self, world: &mut W, _termination: &Termination) {
        self.clear_pellets(world);
    }

    fn observe<W: World>(&self, world: &W) -> Vec<f32> {
        world.pose(self.agent).position.to_array().to_vec()
    }
}

impl Heuristic for PelletGrabber {
    fn heuristic(&self, input: &ManualInput) -> Vec<f32> {
        vec![input.horizontal, input.vertical]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Environment, Signal};

    fn env(config: PelletConfig) -> PelletEnv {
        PelletGrabber::build(config.seed(21)).unwrap()
    }

    fn grab(env: &mut PelletEnv, pellet: BodyId) {
        let position = env.world().pose(pellet).position;
        let agent = env.scenario().agent();
        env.world_mut().set_pose(agent, Pose::at(position));
    }

    #[test]
    fn test_pellet_reset() {
        let mut env = env(PelletConfig::new());
        let obs = env.reset().unwrap();
        assert_eq!(obs, vec![0.0, 0.25, 0.0]);

        let pellets = env.world().bodies_with_tag(Tag::Pellet);
        assert_eq!(pellets.len(), 5);
        for pellet in pellets {
            let position = env.world().pose(pellet).position;
            assert!(position.distance(Vec3::new(0.0, 0.25, 0.0)) > 1.5);
            assert!(position.x.abs() <= 4.75 && position.z.abs() <= 4.75);
        }
    }

    #[test]
    fn test_pellets_regenerated_not_relocated() {
        let mut env = env(PelletConfig::new());
        env.reset().unwrap();
        let first = env.scenario().pellets().to_vec();
        let bodies = env.world().body_count();

        env.reset().unwrap();
        assert_eq!(env.world().body_count(), bodies);
        for old in first {
            assert!(!env.world().contains(old));
        }
    }

    #[test]
    fn test_forward_and_turn() {
        let mut env = env(PelletConfig::new());
        env.reset().unwrap();
        let obs = env.step_slice(&[0.0, 1.0]).unwrap().observation;
        assert!((obs[2] - 0.06).abs() < 1e-5);

        env.step_slice(&[1.0, 0.0]).unwrap();
        let heading = env.world().pose(env.scenario().agent()).euler_degrees().y;
        assert!((heading - 3.0).abs() < 1e-3, "heading {heading}");
    }

    #[test]
    fn test_collect_one_pellet() {
        let mut env = env(PelletConfig::new());
        env.reset().unwrap();
        let pellet = env.scenario().pellets()[0];
        grab(&mut env, pellet);

        let result = env.step_slice(&[0.0, 0.0]).unwrap();
        assert!(!result.done());
        assert_eq!(result.reward, 10.0);
        assert!(!env.world().contains(pellet));
        assert_eq!(env.scenario().pellets().len(), 4);
    }

    #[test]
    fn test_last_pellet_ends_episode() {
        let mut env = env(PelletConfig::new().pellet_count(1));
        env.reset().unwrap();
        let pellet = env.scenario().pellets()[0];
        grab(&mut env, pellet);

        let result = env.step_slice(&[0.0, 0.0]).unwrap();
        assert!(result.terminated);
        assert_eq!(result.reward, 15.0);
        assert_eq!(result.info.cause, Some(TerminationCause::AllPelletsCollected));
        assert_eq!(result.info.signal, Some(Signal::Success));
    }

    #[test]
    fn test_wall_ends_episode_and_clears_pellets() {
        let mut env = env(PelletConfig::new());
        env.reset().unwrap();
        let agent = env.scenario().agent();
        env.world_mut().set_pose(agent, Pose::at(Vec3::new(5.9, 0.25, 0.0)));

        let result = env.step_slice(&[0.0, 0.0]).unwrap();
        assert!(result.terminated);
        assert_eq!(result.reward, -15.0);
        assert_eq!(result.info.cause, Some(TerminationCause::HitWall));
        assert!(env.world().bodies_with_tag(Tag::Pellet).is_empty());
    }

    #[test]
    fn test_timeout_clears_pellets() {
        let mut env = env(PelletConfig::new().time_for_episode(0.1));
        env.reset().unwrap();
        let mut last = None;
        for _ in 0..20 {
            let result = env.step_slice(&[0.0, 0.0]).unwrap();
            if result.done() {
                last = Some(result);
                break;
            }
        }
        let result = last.unwrap();
        assert!(result.truncated);
        assert_eq!(result.reward, -15.0);
        assert_eq!(result.info.signal, Some(Signal::Timeout));
        assert!(env.world().bodies_with_tag(Tag::Pellet).is_empty());
    }

    #[test]
    fn test_crowded_layout_still_resets() {
        let mut env = env(PelletConfig::new().pellet_count(12).min_separation(6.0).max_attempts(4));
        env.reset().unwrap();
        assert_eq!(env.scenario().pellets().len(), 12);
        assert!(env.scenario().placement_fallbacks() > 0);
    }

    #[test]
    fn test_heuristic() {
        let env = env(PelletConfig::new());
        assert_eq!(env.heuristic(&ManualInput::new(1.0, -1.0)), vec![1.0, -1.0]);
    }

    #[test]
    fn test_config_validation() {
        assert!(PelletConfig::new().validate().is_ok());
        assert!(PelletConfig::new().pellet_count(0).validate().is_err());
        assert!(PelletConfig::new().time_for_episode(-1.0).validate().is_err());
    }
}
