//! Cat and mouse
//!
//! Two agents share one walled arena. The mouse grabs the cheese and runs for
//! the exit; the cat tries to catch it first. Each agent has its own episode,
//! so one can be reset while the other keeps running.
//!
//! - Observation (3 per agent): own position in the arena frame
//! - Action (2 per agent): `[move, rotate]` in `[-1, 1]`
//! - Cat: `+50` for catching the mouse, `-10` for touching a wall
//! - Mouse: `+20` for the cheese (once per episode), `+50` for reaching the
//!   exit while holding it, `-10` for touching a wall, `-20` when caught

use anyhow::{anyhow, Result};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::env::spawn::SpawnPoints;
use crate::env::{
    ActionRange, ActionSpec, AgentLoop, EnvError, EpisodePhase, Heuristic, ManualInput, Scenario,
    SpaceInfo, StepResult, Termination, TerminationCause, TimeoutPolicy, Verdict,
};
use crate::physics::{
    yaw, BodyId, BodySpec, ContactEvent, ContactKind, KinematicWorld, Pose, Tag, World,
};

/// Cat and mouse parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaseConfig {
    /// Forward speed at full action, units per second
    pub move_speed: f32,

    /// Turn rate at full action, degrees per second
    pub rotate_speed: f32,

    /// Inner faces of the walls sit at `±arena_half_extent`
    pub arena_half_extent: f32,

    pub agent_radius: f32,
    pub cheese_radius: f32,
    pub exit_half_extents: Vec3,

    pub cat_start: Vec3,
    /// Degrees about the vertical axis
    pub cat_start_yaw: f32,
    pub mouse_start: Vec3,
    pub mouse_start_yaw: f32,
    pub cheese_position: Vec3,
    pub exit_position: Vec3,

    /// When set, every agent reset moves the agent to one of these points
    pub spawn_points: Option<Vec<Vec3>>,

    pub catch_reward: f32,
    pub cat_wall_penalty: f32,
    pub cheese_reward: f32,
    pub escape_reward: f32,
    pub mouse_wall_penalty: f32,
    pub caught_penalty: f32,

    /// Applies to both agents
    pub timeout: TimeoutPolicy,

    /// Physics tick, seconds
    pub delta_time: f32,

    pub seed: Option<u64>,
}

impl Default for ChaseConfig {
    fn default() -> Self {
        Self {
            move_speed: 10.0,
            rotate_speed: 100.0,
            arena_half_extent: 10.0,
            agent_radius: 0.5,
            cheese_radius: 0.3,
            exit_half_extents: Vec3::new(1.0, 1.0, 1.0),
            cat_start: Vec3::new(-6.0, 0.5, -6.0),
            cat_start_yaw: 45.0,
            mouse_start: Vec3::new(6.0, 0.5, 6.0),
            mouse_start_yaw: 225.0,
            cheese_position: Vec3::new(-6.0, 0.5, 6.0),
            exit_position: Vec3::new(6.0, 0.5, -6.0),
            spawn_points: None,
            catch_reward: 50.0,
            cat_wall_penalty: -10.0,
            cheese_reward: 20.0,
            escape_reward: 50.0,
            mouse_wall_penalty: -10.0,
            caught_penalty: -20.0,
            timeout: TimeoutPolicy::Disabled,
            delta_time: 0.02,
            seed: None,
        }
    }
}

impl ChaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.move_speed <= 0.0 {
            return Err(anyhow!("move_speed must be positive"));
        }
        if self.rotate_speed <= 0.0 {
            return Err(anyhow!("rotate_speed must be positive"));
        }
        if self.arena_half_extent <= self.agent_radius {
            return Err(anyhow!("arena is too small for the agents"));
        }
        if matches!(&self.spawn_points, Some(points) if points.is_empty()) {
            return Err(anyhow!("spawn_points must not be empty when set"));
        }
        if self.delta_time <= 0.0 {
            return Err(anyhow!("delta_time must be positive"));
        }
        self.timeout.validate()
    }

    pub fn spawn_points(mut self, points: Vec<Vec3>) -> Self {
        self.spawn_points = Some(points);
        self
    }

    pub fn timeout(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout = policy;
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
}

/// Which agent of the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Cat,
    Mouse,
}

/// Bodies of a chase arena
#[derive(Debug, Clone, PartialEq)]
pub struct ChaseBodies {
    pub cat: BodyId,
    pub mouse: BodyId,
    pub cheese: BodyId,
    pub exit: BodyId,
    pub walls: Vec<BodyId>,
}

/// Shared movement for both agents: drive along the facing, turn about y
#[derive(Debug, Clone)]
struct Runner {
    body: BodyId,
    start: Pose,
    move_speed: f32,
    rotate_speed: f32,
    timeout: TimeoutPolicy,
    spec: ActionSpec,
}

impl Runner {
    fn new<W: World>(body: BodyId, world: &W, config: &ChaseConfig) -> Self {
        Self {
            body,
            start: world.pose(body),
            move_speed: config.move_speed,
            rotate_speed: config.rotate_speed,
            timeout: config.timeout,
            spec: ActionSpec::uniform(2, ActionRange::SYMMETRIC),
        }
    }

    fn reset<W: World>(&self, world: &mut W) {
        world.set_pose(self.body, self.start);
        world.set_velocity(self.body, Vec3::ZERO);
    }

    fn drive<W: World>(&self, world: &mut W, action: &[f32], delta_time: f32) {
        let mut pose = world.pose(self.body);
        world.set_velocity(self.body, pose.forward() * self.move_speed * action[0]);
        let turn = yaw(self.rotate_speed * action[1] * delta_time);
        pose.rotation = (pose.rotation * turn).normalize();
        world.set_pose(self.body, pose);
    }

    /// Stop the body so it stays put once its episode is over
    fn halt<W: World>(&self, world: &mut W) {
        world.set_velocity(self.body, Vec3::ZERO);
    }

    fn observe<W: World>(&self, world: &W) -> Vec<f32> {
        world.pose(self.body).position.to_array().to_vec()
    }
}

/// The chasing agent
#[derive(Debug, Clone)]
pub struct Cat {
    runner: Runner,
    mouse: BodyId,
    walls: Vec<BodyId>,
    catch_reward: f32,
    wall_penalty: f32,
}

impl Cat {
    pub fn new<W: World>(
        config: &ChaseConfig,
        world: &W,
        bodies: &ChaseBodies,
    ) -> Result<Self, EnvError> {
        require(world, [bodies.cat])?;
        Ok(Self {
            runner: Runner::new(bodies.cat, world, config),
            mouse: bodies.mouse,
            walls: bodies.walls.clone(),
            catch_reward: config.catch_reward,
            wall_penalty: config.cat_wall_penalty,
        })
    }

    pub fn body(&self) -> BodyId {
        self.runner.body
    }

    /// Move the start pose; takes effect on the next reset
    pub fn set_start(&mut self, position: Vec3) {
        self.runner.start.position = position;
    }
}

impl Scenario for Cat {
    fn action_spec(&self) -> &ActionSpec {
        &self.runner.spec
    }

    fn observation_len(&self) -> usize {
        3
    }

    fn timeout(&self) -> TimeoutPolicy {
        self.runner.timeout
    }

    fn owned_bodies(&self) -> Vec<BodyId> {
        vec![self.runner.body]
    }

    fn required_bodies(&self) -> Vec<BodyId> {
        let mut required = vec![self.runner.body, self.mouse];
        required.extend(&self.walls);
        required
    }

    fn reset<W: World>(&mut self, world: &mut W, _rng: &mut StdRng) {
        self.runner.reset(world);
    }

    fn apply<W: World>(&mut self, world: &mut W, action: &[f32], delta_time: f32) {
        self.runner.drive(world, action, delta_time);
    }

    fn evaluate<W: World>(
        &mut self,
        _world: &mut W,
        events: &[ContactEvent],
        verdict: &mut Verdict,
    ) {
        let body = self.runner.body;
        let touched = |kind, tag| ContactEvent::any_with(events, kind, body, tag);
        if touched(ContactKind::TriggerEnter, Tag::Wall) {
            verdict.fire(TerminationCause::HitWall, self.wall_penalty);
        }
        if touched(ContactKind::CollisionEnter, Tag::Mouse) {
            verdict.fire(TerminationCause::CaughtMouse, self.catch_reward);
        }
    }

    fn conclude<W: World>(&mut self, world: &mut W, _termination: &Termination) {
        self.runner.halt(world);
    }

    fn observe<W: World>(&self, world: &W) -> Vec<f32> {
        self.runner.observe(world)
    }
}

impl Heuristic for Cat {
    fn heuristic(&self, input: &ManualInput) -> Vec<f32> {
        vec![input.vertical, input.horizontal]
    }
}

/// The fleeing agent; owns the cheese
#[derive(Debug, Clone)]
pub struct Mouse {
    runner: Runner,
    cheese: BodyId,
    exit: BodyId,
    cat: BodyId,
    walls: Vec<BodyId>,
    got_cheese: bool,
    cheese_reward: f32,
    escape_reward: f32,
    wall_penalty: f32,
    caught_penalty: f32,
}

impl Mouse {
    pub fn new<W: World>(
        config: &ChaseConfig,
        world: &W,
        bodies: &ChaseBodies,
    ) -> Result<Self, EnvError> {
        require(world, [bodies.mouse])?;
        Ok(Self {
            runner: Runner::new(bodies.mouse, world, config),
            cheese: bodies.cheese,
            exit: bodies.exit,
            cat: bodies.cat,
            walls: bodies.walls.clone(),
            got_cheese: false,
            cheese_reward: config.cheese_reward,
            escape_reward: config.escape_reward,
            wall_penalty: config.mouse_wall_penalty,
            caught_penalty: config.caught_penalty,
        })
    }

    pub fn body(&self) -> BodyId {
        self.runner.body
    }

    pub fn has_cheese(&self) -> bool {
        self.got_cheese
    }

    /// Move the start pose; takes effect on the next reset
    pub fn set_start(&mut self, position: Vec3) {
        self.runner.start.position = position;
    }
}

impl Scenario for Mouse {
    fn action_spec(&self) -> &ActionSpec {
        &self.runner.spec
    }

    fn observation_len(&self) -> usize {
        3
    }

    fn timeout(&self) -> TimeoutPolicy {
        self.runner.timeout
    }

    fn owned_bodies(&self) -> Vec<BodyId> {
        vec![self.runner.body, self.cheese]
    }

    fn required_bodies(&self) -> Vec<BodyId> {
        let mut required = vec![self.runner.body, self.cheese, self.exit, self.cat];
        required.extend(&self.walls);
        required
    }

    fn reset<W: World>(&mut self, world: &mut W, _rng: &mut StdRng) {
        self.got_cheese = false;
        world.set_active(self.cheese, true);
        self.runner.reset(world);
    }

    fn apply<W: World>(&mut self, world: &mut W, action: &[f32], delta_time: f32) {
        self.runner.drive(world, action, delta_time);
    }

    fn evaluate<W: World>(
        &mut self,
        world: &mut W,
        events: &[ContactEvent],
        verdict: &mut Verdict,
    ) {
        let body = self.runner.body;
        let touched = |kind, tag| ContactEvent::any_with(events, kind, body, tag);
        let entered = |tag: Tag| touched(ContactKind::TriggerEnter, tag);

        // Cheese first, so grabbing it and reaching the exit in one tick counts
        let cheese = self.cheese;
        let touched_cheese =
            events.iter().any(|e| e.is(ContactKind::TriggerEnter, body) && e.other == cheese);
        if touched_cheese && !self.got_cheese {
            self.got_cheese = true;
            world.set_active(cheese, false);
            verdict.reward(self.cheese_reward);
        }

        if entered(Tag::Exit) && self.got_cheese {
            verdict.fire(TerminationCause::EscapedWithCheese, self.escape_reward);
        }
        if entered(Tag::Wall) {
            verdict.fire(TerminationCause::HitWall, self.wall_penalty);
        }
        if touched(ContactKind::CollisionEnter, Tag::Cat) {
            verdict.fire(TerminationCause::CaughtByCat, self.caught_penalty);
        }
    }

    fn conclude<W: World>(&mut self, world: &mut W, _termination: &Termination) {
        self.runner.halt(world);
    }

    fn observe<W: World>(&self, world: &W) -> Vec<f32> {
        self.runner.observe(world)
    }
}

impl Heuristic for Mouse {
    fn heuristic(&self, input: &ManualInput) -> Vec<f32> {
        vec![input.vertical, input.horizontal]
    }
}

fn require<W: World>(world: &W, bodies: impl IntoIterator<Item = BodyId>) -> Result<(), EnvError> {
    match bodies.into_iter().find(|&id| !world.contains(id)) {
        Some(missing) => Err(EnvError::MissingBody(missing)),
        None => Ok(()),
    }
}

/// Both agents' first observations
#[derive(Debug, Clone, PartialEq)]
pub struct ChaseObservation {
    pub cat: Vec<f32>,
    pub mouse: Vec<f32>,
}

/// Results of one shared tick; `None` for an agent that was not running
#[derive(Debug, Clone)]
pub struct ChaseStep {
    pub cat: Option<StepResult<Vec<f32>>>,
    pub mouse: Option<StepResult<Vec<f32>>>,
}

/// Cat and mouse sharing one world
pub struct ChaseEnv<W = KinematicWorld> {
    world: W,
    cat: AgentLoop<Cat>,
    mouse: AgentLoop<Mouse>,
    spawns: Option<SpawnPoints>,
    spawn_rng: StdRng,
}

impl ChaseEnv<KinematicWorld> {
    /// Build the arena, both agents, the cheese and the exit in a fresh world
    pub fn build(config: ChaseConfig) -> Result<Self> {
        config.validate()?;
        let mut world = KinematicWorld::new(config.delta_time);

        let cat = world.spawn(
            BodySpec::sphere(Tag::Cat, config.agent_radius)
                .at(config.cat_start)
                .rotated(yaw(config.cat_start_yaw)),
        );
        let mouse = world.spawn(
            BodySpec::sphere(Tag::Mouse, config.agent_radius)
                .at(config.mouse_start)
                .rotated(yaw(config.mouse_start_yaw)),
        );
        let cheese = world.spawn(
            BodySpec::sphere(Tag::Cheese, config.cheese_radius)
                .at(config.cheese_position)
                .trigger(),
        );
        let exit = world.spawn(
            BodySpec::cuboid(Tag::Exit, config.exit_half_extents)
                .at(config.exit_position)
                .trigger(),
        );

        let thickness = 0.25;
        let offset = config.arena_half_extent + thickness;
        let span = config.arena_half_extent + 2.0 * thickness;
        let walls = [
            (Vec3::new(offset, 0.5, 0.0), Vec3::new(thickness, 1.0, span)),
            (Vec3::new(-offset, 0.5, 0.0), Vec3::new(thickness, 1.0, span)),
            (Vec3::new(0.0, 0.5, offset), Vec3::new(span, 1.0, thickness)),
            (Vec3::new(0.0, 0.5, -offset), Vec3::new(span, 1.0, thickness)),
        ]
        .into_iter()
        .map(|(position, half_extents)| {
            world.spawn(BodySpec::cuboid(Tag::Wall, half_extents).at(position).trigger())
        })
        .collect();

        let bodies = ChaseBodies { cat, mouse, cheese, exit, walls };
        let spawns = config.spawn_points.clone().map(SpawnPoints::new).transpose()?;
        let cat = Cat::new(&config, &world, &bodies)?;
        let mouse = Mouse::new(&config, &world, &bodies)?;
        Ok(Self::new(world, cat, mouse, spawns, config.seed)?)
    }
}

impl<W: World> ChaseEnv<W> {
    /// Pair two agents in `world`; they must not own the same body
    pub fn new(
        world: W,
        cat: Cat,
        mouse: Mouse,
        spawns: Option<SpawnPoints>,
        seed: Option<u64>,
    ) -> Result<Self, EnvError> {
        let cat_owned = cat.owned_bodies();
        if let Some(&shared) = mouse.owned_bodies().iter().find(|id| cat_owned.contains(*id)) {
            return Err(EnvError::SharedOwnership(shared));
        }
        let offset = |n: u64| seed.map(|s| s.wrapping_add(n));
        Ok(Self {
            cat: AgentLoop::new(cat, &world, seed)?,
            mouse: AgentLoop::new(mouse, &world, offset(1))?,
            spawns,
            spawn_rng: offset(2).map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
            world,
        })
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    /// Direct world access, for scripting situations in tests and demos
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn cat(&self) -> &AgentLoop<Cat> {
        &self.cat
    }

    pub fn mouse(&self) -> &AgentLoop<Mouse> {
        &self.mouse
    }

    pub fn phase(&self, role: Role) -> EpisodePhase {
        match role {
            Role::Cat => self.cat.phase(),
            Role::Mouse => self.mouse.phase(),
        }
    }

    /// Start new episodes for both agents
    pub fn reset(&mut self) -> Result<ChaseObservation, EnvError> {
        let cat = self.reset_agent(Role::Cat)?;
        let mouse = self.reset_agent(Role::Mouse)?;
        Ok(ChaseObservation { cat, mouse })
    }

    /// Start a new episode for one agent; the other keeps its episode
    pub fn reset_agent(&mut self, role: Role) -> Result<Vec<f32>, EnvError> {
        let spawn = match self.spawns.as_mut() {
            Some(spawns) => {
                let current = match role {
                    Role::Cat => self.world.pose(self.cat.scenario().body()).position,
                    Role::Mouse => self.world.pose(self.mouse.scenario().body()).position,
                };
                Some(spawns.place(current, &mut self.spawn_rng))
            }
            None => None,
        };

        match role {
            Role::Cat => {
                if let Some(position) = spawn {
                    self.cat.scenario_mut().set_start(position);
                }
                self.cat.reset(&mut self.world)
            }
            Role::Mouse => {
                if let Some(position) = spawn {
                    self.mouse.scenario_mut().set_start(position);
                }
                self.mouse.reset(&mut self.world)
            }
        }
    }

    /// Advance the shared world one tick
    ///
    /// Only agents with a running episode act and receive a result; the
    /// action passed for any other agent is ignored.
    pub fn step(
        &mut self,
        cat_action: &[f32],
        mouse_action: &[f32],
    ) -> Result<ChaseStep, EnvError> {
        let (cat_phase, mouse_phase) = (self.cat.phase(), self.mouse.phase());
        let cat_running = cat_phase == EpisodePhase::Running;
        let mouse_running = mouse_phase == EpisodePhase::Running;
        if !cat_running && !mouse_running {
            let idle = cat_phase == EpisodePhase::Idle && mouse_phase == EpisodePhase::Idle;
            return Err(if idle { EnvError::NotStarted } else { EnvError::NoActiveAgent });
        }

        // Reject a malformed action before either agent has acted
        for (running, spec, action) in [
            (cat_running, self.cat.scenario().action_spec(), cat_action),
            (mouse_running, self.mouse.scenario().action_spec(), mouse_action),
        ] {
            if running && action.len() != spec.len() {
                return Err(EnvError::ActionShape { expected: spec.len(), actual: action.len() });
            }
        }

        if cat_running {
            self.cat.begin_tick(&mut self.world, cat_action)?;
        }
        if mouse_running {
            self.mouse.begin_tick(&mut self.world, mouse_action)?;
        }

        let events = self.world.advance();

        let world = &mut self.world;
        let cat = if cat_running { Some(self.cat.finish_tick(world, &events)?) } else { None };
        let mouse =
            if mouse_running { Some(self.mouse.finish_tick(world, &events)?) } else { None };
        Ok(ChaseStep { cat, mouse })
    }

    pub fn observation_space(&self, role: Role) -> SpaceInfo {
        match role {
            Role::Cat => self.cat.observation_space(),
            Role::Mouse => self.mouse.observation_space(),
        }
    }

    pub fn action_space(&self, role: Role) -> SpaceInfo {
        match role {
            Role::Cat => self.cat.action_space(),
            Role::Mouse => self.mouse.action_space(),
        }
    }

    /// Action a human would produce for `role` with `input`
    pub fn heuristic(&self, role: Role, input: &ManualInput) -> Vec<f32> {
        match role {
            Role::Cat => self.cat.scenario().heuristic(input),
            Role::Mouse => self.mouse.scenario().heuristic(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STILL: [f32; 2] = [0.0, 0.0];

    fn env() -> ChaseEnv {
        ChaseEnv::build(ChaseConfig::new().seed(8)).unwrap()
    }

    fn teleport(env: &mut ChaseEnv, body: BodyId, position: Vec3) {
        env.world_mut().set_pose(body, Pose::at(position));
    }

    #[test]
    fn test_chase_reset() {
        let mut env = env();
        let obs = env.reset().unwrap();
        assert_eq!(obs.cat, vec![-6.0, 0.5, -6.0]);
        assert_eq!(obs.mouse, vec![6.0, 0.5, 6.0]);
        assert_eq!(env.observation_space(Role::Mouse).shape, vec![3]);
        assert_eq!(env.action_space(Role::Cat).shape, vec![2]);
    }

    #[test]
    fn test_step_before_reset() {
        let mut env = env();
        assert_eq!(env.step(&STILL, &STILL).unwrap_err(), EnvError::NotStarted);
    }

    #[test]
    fn test_neutral_steps_keep_running() {
        let mut env = env();
        env.reset().unwrap();
        for _ in 0..10 {
            let step = env.step(&STILL, &STILL).unwrap();
            assert!(!step.cat.unwrap().done());
            assert!(!step.mouse.unwrap().done());
        }
    }

    #[test]
    fn test_cat_moves_forward() {
        let mut env = env();
        env.reset().unwrap();
        let step = env.step(&[1.0, 0.0], &STILL).unwrap();
        let obs = step.cat.unwrap().observation;
        let moved = Vec3::from_slice(&obs).distance(Vec3::new(-6.0, 0.5, -6.0));
        assert!((moved - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_exit_without_cheese_grants_nothing() {
        let mut env = env();
        env.reset().unwrap();
        let mouse = env.mouse().scenario().body();
        teleport(&mut env, mouse, Vec3::new(6.0, 0.5, -6.0));

        let result = env.step(&STILL, &STILL).unwrap().mouse.unwrap();
        assert_eq!(result.reward, 0.0);
        assert!(!result.done());
    }

    #[test]
    fn test_cheese_then_exit() {
        let mut env = env();
        env.reset().unwrap();
        let mouse = env.mouse().scenario().body();

        teleport(&mut env, mouse, Vec3::new(-6.0, 0.5, 6.0));
        let result = env.step(&STILL, &STILL).unwrap().mouse.unwrap();
        assert_eq!(result.reward, 20.0);
        assert!(!result.done());
        assert!(env.mouse().scenario().has_cheese());

        teleport(&mut env, mouse, Vec3::new(6.0, 0.5, -6.0));
        let result = env.step(&STILL, &STILL).unwrap().mouse.unwrap();
        assert_eq!(result.reward, 50.0);
        assert!(result.terminated);
        assert_eq!(result.info.cause, Some(TerminationCause::EscapedWithCheese));
        assert_eq!(result.info.cumulative_reward, 70.0);
    }

    #[test]
    fn test_cheese_only_once_and_reactivated_on_reset() {
        let mut env = env();
        env.reset().unwrap();
        let mouse = env.mouse().scenario().body();
        let cheese_spot = Vec3::new(-6.0, 0.5, 6.0);

        teleport(&mut env, mouse, cheese_spot);
        assert_eq!(env.step(&STILL, &STILL).unwrap().mouse.unwrap().reward, 20.0);

        teleport(&mut env, mouse, Vec3::ZERO);
        env.step(&STILL, &STILL).unwrap();
        teleport(&mut env, mouse, cheese_spot);
        assert_eq!(env.step(&STILL, &STILL).unwrap().mouse.unwrap().reward, 0.0);

        env.reset_agent(Role::Mouse).unwrap();
        assert!(!env.mouse().scenario().has_cheese());
        teleport(&mut env, mouse, cheese_spot);
        assert_eq!(env.step(&STILL, &STILL).unwrap().mouse.unwrap().reward, 20.0);
    }

    #[test]
    fn test_catch_ends_both_episodes() {
        let mut env = env();
        env.reset().unwrap();
        let cat = env.cat().scenario().body();
        teleport(&mut env, cat, Vec3::new(5.5, 0.5, 6.0));

        let step = env.step(&STILL, &STILL).unwrap();
        let cat = step.cat.unwrap();
        let mouse = step.mouse.unwrap();
        assert_eq!(cat.reward, 50.0);
        assert_eq!(cat.info.cause, Some(TerminationCause::CaughtMouse));
        assert_eq!(mouse.reward, -20.0);
        assert_eq!(mouse.info.cause, Some(TerminationCause::CaughtByCat));

        assert_eq!(env.step(&STILL, &STILL).unwrap_err(), EnvError::NoActiveAgent);
    }

    #[test]
    fn test_agents_reset_independently() {
        let mut env = env();
        env.reset().unwrap();
        let cat = env.cat().scenario().body();
        teleport(&mut env, cat, Vec3::new(9.8, 0.5, 0.0));

        let step = env.step(&STILL, &STILL).unwrap();
        let result = step.cat.unwrap();
        assert_eq!(result.reward, -10.0);
        assert_eq!(result.info.cause, Some(TerminationCause::HitWall));
        assert!(!step.mouse.unwrap().done());

        // Terminal cat sits out while the mouse keeps going
        let step = env.step(&STILL, &STILL).unwrap();
        assert!(step.cat.is_none());
        assert!(step.mouse.is_some());

        let obs = env.reset_agent(Role::Cat).unwrap();
        assert_eq!(obs, vec![-6.0, 0.5, -6.0]);
        assert!(env.step(&STILL, &STILL).unwrap().cat.is_some());
    }

    #[test]
    fn test_ended_agent_stops_moving() {
        let mut env = env();
        env.reset().unwrap();
        let mouse = env.mouse().scenario().body();

        // Mouse heads off at full speed, then lands in the east wall
        env.step(&STILL, &[1.0, 0.0]).unwrap();
        assert_ne!(env.world().velocity(mouse), Vec3::ZERO);
        teleport(&mut env, mouse, Vec3::new(9.8, 0.5, 6.0));
        let result = env.step(&STILL, &[1.0, 0.0]).unwrap().mouse.unwrap();
        assert_eq!(result.info.cause, Some(TerminationCause::HitWall));
        assert_eq!(env.world().velocity(mouse), Vec3::ZERO);

        // Cat waits just ahead of the mouse's last heading (+z)
        let resting = Vec3::new(8.0, 0.5, 6.0);
        teleport(&mut env, mouse, resting);
        let cat = env.cat().scenario().body();
        teleport(&mut env, cat, Vec3::new(8.0, 0.5, 7.5));
        for _ in 0..5 {
            let step = env.step(&STILL, &STILL).unwrap();
            assert!(step.mouse.is_none());
            assert!(!step.cat.unwrap().done());
        }
        assert_eq!(env.world().pose(mouse).position, resting);
    }

    #[test]
    fn test_malformed_action_rejected_before_acting() {
        let mut env = env();
        env.reset().unwrap();
        let err = env.step(&[1.0, 0.0], &[1.0]).unwrap_err();
        assert_eq!(err, EnvError::ActionShape { expected: 2, actual: 1 });
        assert_eq!(env.cat().episode().steps(), 0);
    }

    #[test]
    fn test_spawn_points() {
        let points = vec![Vec3::new(-3.0, 0.0, -3.0), Vec3::new(3.0, 0.0, 3.0)];
        let mut env = ChaseEnv::build(ChaseConfig::new().spawn_points(points).seed(3)).unwrap();
        let obs = env.reset().unwrap();

        // Both points used once, heights kept
        let mut xs = vec![obs.cat[0], obs.mouse[0]];
        xs.sort_by(f32::total_cmp);
        assert_eq!(xs, vec![-3.0, 3.0]);
        assert_eq!(obs.cat[1], 0.5);
        assert_eq!(obs.mouse[1], 0.5);
    }

    #[test]
    fn test_shared_ownership_rejected() {
        let config = ChaseConfig::new();
        let mut world = KinematicWorld::new(config.delta_time);
        let cat = world.spawn(BodySpec::sphere(Tag::Cat, 0.5));
        let mouse = world.spawn(BodySpec::sphere(Tag::Mouse, 0.5).at(Vec3::X * 4.0));
        let exit = world.spawn(BodySpec::cuboid(Tag::Exit, Vec3::ONE).trigger());
        // The mouse claims the cat as its cheese
        let bodies = ChaseBodies { cat, mouse, cheese: cat, exit, walls: Vec::new() };

        let cat_agent = Cat::new(&config, &world, &bodies).unwrap();
        let mouse_agent = Mouse::new(&config, &world, &bodies).unwrap();
        let err = ChaseEnv::new(world, cat_agent, mouse_agent, None, Some(1)).err();
        assert_eq!(err, Some(EnvError::SharedOwnership(cat)));
    }

    #[test]
    fn test_heuristic() {
        let env = env();
        let input = ManualInput::new(-1.0, 1.0);
        assert_eq!(env.heuristic(Role::Cat, &input), vec![1.0, -1.0]);
        assert_eq!(env.heuristic(Role::Mouse, &input), vec![1.0, -1.0]);
    }
}
