//! Balance board
//!
//! A board carrying two balls is tilted about its local x and z axes. The
//! agent earns a small reward every tick both balls stay up and is penalised
//! when either drops below the fall threshold.
//!
//! - Observation (15): board euler angles in degrees (3), ball A position (3),
//!   ball A velocity (3), ball B position (3), ball B velocity (3)
//! - Action (2): `[rotate_x, rotate_z]` in `[-1, 1]`
//! - Reward: `+0.1` per tick, `-5` when a ball falls
//! - Timeout: cosmetic; past the time limit a success signal is shown and the
//!   episode keeps going
//!
//! Tilting only moves the balls through a physics [`World`] with gravity and
//! contact response. [`KinematicWorld`] has neither, so on it the balls stay
//! put and a fall only happens when a caller moves a ball.
//!
//! [`World`]: crate::physics::World
//! [`KinematicWorld`]: crate::physics::KinematicWorld

use anyhow::{anyhow, Result};
use glam::{EulerRot, Quat, Vec3};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::env::{
    ActionRange, ActionSpec, AgentLoop, EnvError, Heuristic, ManualInput, Scenario, SoloEnv,
    TerminationCause, TimeoutPolicy, Verdict,
};
use crate::physics::{
    quat_from_euler_degrees, BodyId, BodySpec, ContactEvent, KinematicWorld, Pose, Tag, World,
};

/// Balance board environment
pub type BalanceEnv = SoloEnv<BalanceBoard>;

/// Balance board parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Board tilt rate at full action, degrees per second
    pub rotate_speed: f32,

    /// A ball at or below this height has fallen
    pub fall_threshold: f32,

    /// Seconds after which the success signal is shown
    pub time_limit: f32,

    /// Upper bound of the random initial tilt about x and z, degrees
    pub max_initial_angle: f32,

    pub fall_penalty: f32,

    /// Reward for every tick both balls stay up
    pub balance_reward: f32,

    pub ball_positions: [Vec3; 2],
    pub ball_radius: f32,
    pub board_half_extents: Vec3,

    /// Physics tick, seconds
    pub delta_time: f32,

    pub seed: Option<u64>,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            rotate_speed: 100.0,
            fall_threshold: -0.5,
            time_limit: 20.0,
            max_initial_angle: 80.0,
            fall_penalty: -5.0,
            balance_reward: 0.1,
            ball_positions: [Vec3::new(-0.6, 1.0, 0.0), Vec3::new(0.6, 1.0, 0.0)],
            ball_radius: 0.25,
            board_half_extents: Vec3::new(2.5, 0.1, 2.5),
            delta_time: 0.02,
            seed: None,
        }
    }
}

impl BalanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.rotate_speed <= 0.0 {
            return Err(anyhow!("rotate_speed must be positive"));
        }
        if self.time_limit <= 0.0 {
            return Err(anyhow!("time_limit must be positive"));
        }
        if !(0.0..=360.0).contains(&self.max_initial_angle) {
            return Err(anyhow!("max_initial_angle must be in [0, 360]"));
        }
        if self.delta_time <= 0.0 {
            return Err(anyhow!("delta_time must be positive"));
        }
        if self.ball_radius <= 0.0 {
            return Err(anyhow!("ball_radius must be positive"));
        }
        if self.ball_positions.iter().any(|p| p.y <= self.fall_threshold) {
            return Err(anyhow!("balls must start above fall_threshold"));
        }
        Ok(())
    }

    pub fn rotate_speed(mut self, speed: f32) -> Self {
        self.rotate_speed = speed;
        self
    }

    pub fn fall_threshold(mut self, threshold: f32) -> Self {
        self.fall_threshold = threshold;
        self
    }

    pub fn time_limit(mut self, seconds: f32) -> Self {
        self.time_limit = seconds;
        self
    }

    pub fn max_initial_angle(mut self, degrees: f32) -> Self {
        self.max_initial_angle = degrees;
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

/// Balance board scenario
#[derive(Debug, Clone)]
pub struct BalanceBoard {
    config: BalanceConfig,
    board: BodyId,
    balls: [BodyId; 2],
    ball_starts: [Vec3; 2],
    start_angles: Vec3,
    spec: ActionSpec,
}

impl BalanceBoard {
    /// Bind to existing bodies; ball start positions are taken from `world`
    pub fn new<W: World>(
        config: BalanceConfig,
        world: &W,
        board: BodyId,
        balls: [BodyId; 2],
    ) -> Result<Self> {
        let bodies = [board, balls[0], balls[1]];
        if let Some(&missing) = bodies.iter().find(|&&id| !world.contains(id)) {
            return Err(EnvError::MissingBody(missing).into());
        }
        let ball_starts = balls.map(|ball| world.pose(ball).position);
        Ok(Self {
            config,
            board,
            balls,
            ball_starts,
            start_angles: Vec3::ZERO,
            spec: ActionSpec::uniform(2, ActionRange::SYMMETRIC),
        })
    }

    /// Build a board and two balls in a fresh world
    pub fn build(config: BalanceConfig) -> Result<BalanceEnv> {
        config.validate()?;
        let mut world = KinematicWorld::new(config.delta_time);
        let board = world.spawn(BodySpec::cuboid(Tag::Board, config.board_half_extents));
        let ball = BodySpec::sphere(Tag::Ball, config.ball_radius);
        let balls = config.ball_positions.map(|position| world.spawn(ball.at(position)));
        let seed = config.seed;
        let scenario = Self::new(config, &world, board, balls)?;
        let agent = AgentLoop::new(scenario, &world, seed)?;
        Ok(SoloEnv::new(world, agent))
    }

    /// Euler angles, in degrees, the board was reset to
    pub fn start_angles(&self) -> Vec3 {
        self.start_angles
    }

    pub fn board(&self) -> BodyId {
        self.board
    }

    pub fn balls(&self) -> [BodyId; 2] {
        self.balls
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }
}

impl Scenario for BalanceBoard {
    fn action_spec(&self) -> &ActionSpec {
        &self.spec
    }

    fn observation_len(&self) -> usize {
        15
    }

    fn shaping_reward(&self) -> f32 {
        self.config.balance_reward
    }

    fn timeout(&self) -> TimeoutPolicy {
        TimeoutPolicy::Cosmetic { limit: self.config.time_limit }
    }

    fn owned_bodies(&self) -> Vec<BodyId> {
        vec![self.board, self.balls[0], self.balls[1]]
    }

    fn reset<W: World>(&mut self, world: &mut W, rng: &mut StdRng) {
        let max = self.config.max_initial_angle;
        self.start_angles = Vec3::new(
            rng.gen_range(0.0..=max),
            rng.gen_range(0.0..360.0),
            rng.gen_range(0.0..=max),
        );

        let board_position = world.pose(self.board).position;
        let rotation = quat_from_euler_degrees(self.start_angles);
        world.set_pose(self.board, Pose::new(board_position, rotation));
        world.set_velocity(self.board, Vec3::ZERO);
        world.set_angular_velocity(self.board, Vec3::ZERO);

        for (ball, start) in self.balls.iter().zip(self.ball_starts) {
            world.set_pose(*ball, Pose::at(start));
            world.set_velocity(*ball, Vec3::ZERO);
        }
    }

    fn apply<W: World>(&mut self, world: &mut W, action: &[f32], delta_time: f32) {
        let step = self.config.rotate_speed * delta_time;
        let x = (action[0] * step).to_radians();
        let z = (action[1] * step).to_radians();

        // Rotation about the board's own axes
        let mut pose = world.pose(self.board);
        pose.rotation = (pose.rotation * Quat::from_euler(EulerRot::YXZ, 0.0, x, z)).normalize();
        world.set_pose(self.board, pose);
    }

    fn evaluate<W: World>(
        &mut self,
        world: &mut W,
        _events: &[ContactEvent],
        verdict: &mut Verdict,
    ) {
        let threshold = self.config.fall_threshold;
        let fallen = self.balls.iter().any(|&ball| world.pose(ball).position.y <= threshold);
        if fallen {
            verdict.fire(TerminationCause::BallFell, self.config.fall_penalty);
        }
    }

    fn observe<W: World>(&self, world: &W) -> Vec<f32> {
        let mut observation = Vec::with_capacity(15);
        observation.extend(world.pose(self.board).euler_degrees().to_array());
        for &ball in &self.balls {
            observation.extend(world.pose(ball).position.to_array());
            observation.extend(world.velocity(ball).to_array());
        }
        observation
    }
}

impl Heuristic for BalanceBoard {
    fn heuristic(&self, input: &ManualInput) -> Vec<f32> {
        vec![input.vertical, input.horizontal]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Environment, Signal};

    fn seeded() -> BalanceEnv {
        BalanceBoard::build(BalanceConfig::new().seed(11)).unwrap()
    }

    #[test]
    fn test_balance_reset() {
        let mut env = seeded();
        let obs = env.reset().unwrap();
        assert_eq!(obs.len(), 15);
        // Ball A sits at its configured start with no velocity
        assert_eq!(&obs[3..6], &[-0.6, 1.0, 0.0]);
        assert_eq!(&obs[6..9], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_start_angles_within_bounds() {
        let config = BalanceConfig::new().max_initial_angle(30.0).seed(5);
        let mut env = BalanceBoard::build(config).unwrap();
        for _ in 0..50 {
            env.reset().unwrap();
            let angles = env.scenario().start_angles();
            assert!((0.0..=30.0).contains(&angles.x), "x = {}", angles.x);
            assert!((0.0..360.0).contains(&angles.y), "y = {}", angles.y);
            assert!((0.0..=30.0).contains(&angles.z), "z = {}", angles.z);
        }
    }

    #[test]
    fn test_start_angles_resampled_each_reset() {
        let mut env = seeded();
        env.reset().unwrap();
        let first = env.scenario().start_angles();
        env.reset().unwrap();
        assert_ne!(first, env.scenario().start_angles());
    }

    #[test]
    fn test_neutral_step_keeps_running() {
        let mut env = seeded();
        env.reset().unwrap();
        let result = env.step(vec![0.0, 0.0]).unwrap();
        assert!(!result.done());
        assert!((result.reward - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_action_tilts_board() {
        let config = BalanceConfig::new().max_initial_angle(0.0).seed(2);
        let mut env = BalanceBoard::build(config).unwrap();
        env.reset().unwrap();
        let before = env.world().pose(env.scenario().board()).rotation;
        env.step(vec![1.0, 0.0]).unwrap();
        let after = env.world().pose(env.scenario().board()).rotation;
        // 100 deg/s for 0.02 s
        assert!((before.angle_between(after).to_degrees() - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_ball_fall_ends_episode() {
        let mut env = seeded();
        env.reset().unwrap();
        env.step(vec![0.0, 0.0]).unwrap();

        let ball = env.scenario().balls()[1];
        env.world_mut().set_pose(ball, Pose::at(Vec3::new(0.0, -1.0, 0.0)));
        let result = env.step(vec![0.0, 0.0]).unwrap();

        assert!(result.terminated);
        assert_eq!(result.reward, -5.0);
        assert_eq!(result.info.cause, Some(TerminationCause::BallFell));
        assert!((result.info.cumulative_reward - (0.1 - 5.0)).abs() < 1e-5);
        assert_eq!(result.info.signal, Some(Signal::Failure));
    }

    #[test]
    fn test_time_limit_is_cosmetic() {
        let mut env = BalanceBoard::build(BalanceConfig::new().time_limit(0.1).seed(4)).unwrap();
        env.reset().unwrap();
        let mut signalled = false;
        for _ in 0..20 {
            let result = env.step(vec![0.0, 0.0]).unwrap();
            assert!(!result.done());
            signalled |= result.info.signal == Some(Signal::Success);
        }
        assert!(signalled);
    }

    #[test]
    fn test_heuristic_shape() {
        let env = seeded();
        let action = env.heuristic(&ManualInput::new(0.5, -1.0));
        assert_eq!(action, vec![-1.0, 0.5]);
        assert_eq!(action.len(), env.action_space().shape[0]);
    }

    #[test]
    fn test_config_validation() {
        assert!(BalanceConfig::new().validate().is_ok());
        assert!(BalanceConfig::new().rotate_speed(0.0).validate().is_err());
        assert!(BalanceConfig::new().fall_threshold(5.0).validate().is_err());
        assert!(BalanceConfig::new().max_initial_angle(400.0).validate().is_err());
        assert!(BalanceBoard::build(BalanceConfig::new().delta_time(0.0)).is_err());
    }
}
