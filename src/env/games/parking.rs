//! Car parking
//!
//! A car starts facing a parking bay between two parked cars inside a walled
//! lot. Six beacons attached to the car's body let the bay count how much of
//! the car is inside it.
//!
//! - Observation (9): car x, car z, car yaw (degrees), front wheel rpm,
//!   bay x, bay z, bay yaw (degrees), car to bay distance, beacons in bay
//! - Action (3): `[steer, throttle, brake]`, steer and throttle in `[-1, 1]`,
//!   brake in `[0, 1]` and engaged above 0.5
//! - Reward: `+100` parked precisely, `+10` all beacons in the bay, `-5` on
//!   hitting another car or the border, `-2` when time runs out

use std::collections::BTreeSet;
use std::f32::consts::PI;

use anyhow::{anyhow, Result};
use glam::Vec3;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::env::{
    ActionRange, ActionSpec, AgentLoop, EnvError, Heuristic, ManualInput, Scenario, SoloEnv,
    TerminationCause, TimeoutPolicy, Verdict,
};
use crate::physics::{
    yaw, BodyId, BodySpec, ContactEvent, ContactKind, KinematicWorld, Pose, Tag, World,
};

/// Car parking environment
pub type ParkingEnv = SoloEnv<ParkingLot>;

/// Car parking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkingConfig {
    /// Drive force at full throttle, newtons
    pub motor_force: f32,

    /// Braking force, newtons
    pub brake_force: f32,

    pub mass: f32,

    /// Steering angle at full lock, degrees
    pub max_steer_angle: f32,

    /// Distance between front and rear axles
    pub wheelbase: f32,

    /// Linear speed damping, per second
    pub drag: f32,

    pub wheel_radius: f32,

    /// Wheel centres in the car's frame: front left, front right, rear left, rear right
    pub wheel_offsets: [Vec3; 4],

    /// Beacon centres in the car's frame
    pub beacon_offsets: Vec<Vec3>,
    pub beacon_radius: f32,

    /// Beacons that must be inside the bay to end the episode
    pub required_beacons: usize,

    /// Largest car to bay distance that still counts as parked precisely
    pub parking_threshold: f32,

    /// Smallest `|car_forward . bay_forward|` that counts as aligned
    pub alignment_threshold: f32,

    /// Seconds before the episode times out
    pub time_to_park: f32,

    pub parked_reward: f32,
    pub beacon_reward: f32,
    pub collision_penalty: f32,
    pub timeout_penalty: f32,

    pub car_start: Vec3,
    /// Initial heading about the vertical axis, degrees
    pub car_start_yaw: f32,
    pub car_half_extents: Vec3,

    pub bay_position: Vec3,
    pub bay_yaw: f32,
    pub bay_half_extents: Vec3,

    /// Parked cars the agent must avoid
    pub obstacle_positions: Vec<Vec3>,

    /// The lot spans `[-lot_half_extent, lot_half_extent]` on x and z
    pub lot_half_extent: f32,

    /// Physics tick, seconds
    pub delta_time: f32,

    pub seed: Option<u64>,
}

impl Default for ParkingConfig {
    fn default() -> Self {
        Self {
            motor_force: 6000.0,
            brake_force: 12000.0,
            mass: 1200.0,
            max_steer_angle: 30.0,
            wheelbase: 2.8,
            drag: 0.5,
            wheel_radius: 0.35,
            wheel_offsets: [
                Vec3::new(-0.85, -0.2, 1.4),
                Vec3::new(0.85, -0.2, 1.4),
                Vec3::new(-0.85, -0.2, -1.4),
                Vec3::new(0.85, -0.2, -1.4),
            ],
            beacon_offsets: vec![
                Vec3::new(-0.8, 0.0, 1.8),
                Vec3::new(0.8, 0.0, 1.8),
                Vec3::new(-0.8, 0.0, 0.0),
                Vec3::new(0.8, 0.0, 0.0),
                Vec3::new(-0.8, 0.0, -1.8),
                Vec3::new(0.8, 0.0, -1.8),
            ],
            beacon_radius: 0.1,
            required_beacons: 6,
            parking_threshold: 0.25,
            alignment_threshold: 0.9,
            time_to_park: 80.0,
            parked_reward: 100.0,
            beacon_reward: 10.0,
            collision_penalty: -5.0,
            timeout_penalty: -2.0,
            car_start: Vec3::new(0.0, 0.5, -10.0),
            car_start_yaw: 0.0,
            car_half_extents: Vec3::new(1.0, 0.5, 2.2),
            bay_position: Vec3::new(0.0, 0.5, 0.0),
            bay_yaw: 0.0,
            bay_half_extents: Vec3::new(1.5, 1.0, 3.0),
            obstacle_positions: vec![Vec3::new(-3.5, 0.5, 0.0), Vec3::new(3.5, 0.5, 0.0)],
            lot_half_extent: 15.0,
            delta_time: 0.02,
            seed: None,
        }
    }
}

impl ParkingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.mass <= 0.0 {
            return Err(anyhow!("mass must be positive"));
        }
        if self.wheelbase <= 0.0 {
            return Err(anyhow!("wheelbase must be positive"));
        }
        if self.beacon_offsets.is_empty() {
            return Err(anyhow!("at least one beacon is required"));
        }
        if self.required_beacons == 0 || self.required_beacons > self.beacon_offsets.len() {
            return Err(anyhow!(
                "required_beacons must be in [1, {}], got {}",
                self.beacon_offsets.len(),
                self.required_beacons
            ));
        }
        if self.parking_threshold <= 0.0 {
            return Err(anyhow!("parking_threshold must be positive"));
        }
        if !(0.0..=1.0).contains(&self.alignment_threshold) {
            return Err(anyhow!("alignment_threshold must be in [0, 1]"));
        }
        if self.time_to_park <= 0.0 {
            return Err(anyhow!("time_to_park must be positive"));
        }
        if self.lot_half_extent <= 0.0 {
            return Err(anyhow!("lot_half_extent must be positive"));
        }
        if self.delta_time <= 0.0 {
            return Err(anyhow!("delta_time must be positive"));
        }
        Ok(())
    }

    pub fn time_to_park(mut self, seconds: f32) -> Self {
        self.time_to_park = seconds;
        self
    }

    pub fn required_beacons(mut self, count: usize) -> Self {
        self.required_beacons = count;
        self
    }

    pub fn parking_threshold(mut self, distance: f32) -> Self {
        self.parking_threshold = distance;
        self
    }

    pub fn car_start(mut self, position: Vec3, yaw_degrees: f32) -> Self {
        self.car_start = position;
        self.car_start_yaw = yaw_degrees;
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

/// Bodies a [`ParkingLot`] drives and inspects
#[derive(Debug, Clone, PartialEq)]
pub struct ParkingBodies {
    pub car: BodyId,
    pub bay: BodyId,
    /// Trigger markers attached to the car
    pub beacons: Vec<BodyId>,
    pub obstacles: Vec<BodyId>,
    pub borders: Vec<BodyId>,
}

/// Car parking scenario
#[derive(Debug, Clone)]
pub struct ParkingLot {
    config: ParkingConfig,
    bodies: ParkingBodies,
    car_start: Pose,
    bay_start: Pose,
    /// Beacons currently inside the bay
    in_bay: BTreeSet<BodyId>,
    /// Signed forward speed, m/s
    speed: f32,
    spec: ActionSpec,
}

impl ParkingLot {
    /// Bind to existing bodies; start poses are taken from `world`
    pub fn new<W: World>(config: ParkingConfig, world: &W, bodies: ParkingBodies) -> Result<Self> {
        let missing = [bodies.car, bodies.bay]
            .into_iter()
            .chain(bodies.beacons.iter().copied())
            .find(|&id| !world.contains(id));
        if let Some(missing) = missing {
            return Err(EnvError::MissingBody(missing).into());
        }
        Ok(Self {
            car_start: world.pose(bodies.car),
            bay_start: world.pose(bodies.bay),
            config,
            bodies,
            in_bay: BTreeSet::new(),
            speed: 0.0,
            spec: ActionSpec::new(vec![
                ActionRange::SYMMETRIC,
                ActionRange::SYMMETRIC,
                ActionRange::UNIT,
            ]),
        })
    }

    /// Build the lot, the car with its beacons and the bay in a fresh world
    pub fn build(config: ParkingConfig) -> Result<ParkingEnv> {
        config.validate()?;
        let mut world = KinematicWorld::new(config.delta_time);

        let car = world.spawn(
            BodySpec::cuboid(Tag::Car, config.car_half_extents)
                .at(config.car_start)
                .rotated(yaw(config.car_start_yaw)),
        );
        let beacon = BodySpec::sphere(Tag::CarBeacon, config.beacon_radius).trigger();
        let beacons = config
            .beacon_offsets
            .iter()
            .map(|&offset| world.spawn(beacon.attached(car, offset)))
            .collect();
        let bay = world.spawn(
            BodySpec::cuboid(Tag::ParkingBay, config.bay_half_extents)
                .at(config.bay_position)
                .rotated(yaw(config.bay_yaw))
                .trigger(),
        );
        let parked_car = BodySpec::cuboid(Tag::Car, config.car_half_extents);
        let obstacles = config
            .obstacle_positions
            .iter()
            .map(|&position| world.spawn(parked_car.at(position)))
            .collect();

        let reach = config.lot_half_extent + 0.5;
        let span = config.lot_half_extent + 1.0;
        let borders = [
            (Vec3::new(0.0, 1.0, reach), Vec3::new(span, 1.0, 0.5)),
            (Vec3::new(0.0, 1.0, -reach), Vec3::new(span, 1.0, 0.5)),
            (Vec3::new(reach, 1.0, 0.0), Vec3::new(0.5, 1.0, span)),
            (Vec3::new(-reach, 1.0, 0.0), Vec3::new(0.5, 1.0, span)),
        ]
        .into_iter()
        .map(|(position, half_extents)| {
            world.spawn(BodySpec::cuboid(Tag::Border, half_extents).at(position))
        })
        .collect();

        let seed = config.seed;
        let bodies = ParkingBodies { car, bay, beacons, obstacles, borders };
        let scenario = Self::new(config, &world, bodies)?;
        let agent = AgentLoop::new(scenario, &world, seed)?;
        Ok(SoloEnv::new(world, agent))
    }

    pub fn bodies(&self) -> &ParkingBodies {
        &self.bodies
    }

    pub fn config(&self) -> &ParkingConfig {
        &self.config
    }

    pub fn beacons_in_bay(&self) -> usize {
        self.in_bay.len()
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Front wheel revolutions per minute at the current speed
    pub fn wheel_rpm(&self) -> f32 {
        self.speed / (2.0 * PI * self.config.wheel_radius) * 60.0
    }

    fn parked_precisely<W: World>(&self, world: &W) -> bool {
        let car = world.pose(self.bodies.car);
        let bay = world.pose(self.bodies.bay);
        let half = self.config.bay_half_extents;

        // Every wheel's contact patch lies on the bay's footprint
        let down = car.rotation * Vec3::NEG_Y * self.config.wheel_radius;
        let wheels_in = self.config.wheel_offsets.iter().all(|&offset| {
            let local = bay.inverse_transform_point(car.transform_point(offset) + down);
            local.x.abs() <= half.x && local.z.abs() <= half.z
        });

        wheels_in
            && car.forward().dot(bay.forward()).abs() >= self.config.alignment_threshold
            && car.position.distance(bay.position) <= self.config.parking_threshold
    }

    fn track_beacons(&mut self, events: &[ContactEvent]) {
        let bay = self.bodies.bay;
        for event in events.iter().filter(|e| e.body == bay && e.other_tag == Tag::CarBeacon) {
            if !self.bodies.beacons.contains(&event.other) {
                continue;
            }
            match event.kind {
                ContactKind::TriggerEnter => {
                    self.in_bay.insert(event.other);
                }
                ContactKind::TriggerExit => {
                    self.in_bay.remove(&event.other);
                }
                ContactKind::CollisionEnter => {}
            }
        }
    }
}

impl Scenario for ParkingLot {
    fn action_spec(&self) -> &ActionSpec {
        &self.spec
    }

    fn observation_len(&self) -> usize {
        9
    }

    fn timeout(&self) -> TimeoutPolicy {
        TimeoutPolicy::Terminal {
            limit: self.config.time_to_park,
            reward: self.config.timeout_penalty,
        }
    }

    fn owned_bodies(&self) -> Vec<BodyId> {
        let mut owned = vec![self.bodies.car, self.bodies.bay];
        owned.extend(&self.bodies.beacons);
        owned
    }

    fn required_bodies(&self) -> Vec<BodyId> {
        let mut required = self.owned_bodies();
        required.extend(&self.bodies.obstacles);
        required.extend(&self.bodies.borders);
        required
    }

    fn reset<W: World>(&mut self, world: &mut W, _rng: &mut StdRng) {
        world.set_pose(self.bodies.car, self.car_start);
        world.set_velocity(self.bodies.car, Vec3::ZERO);
        world.set_angular_velocity(self.bodies.car, Vec3::ZERO);
        world.set_pose(self.bodies.bay, self.bay_start);
        self.speed = 0.0;

        // Contact history may still hold the last episode's beacons; start
        // from geometry so stale exits are no-ops
        let bay = self.bodies.bay;
        self.in_bay = self
            .bodies
            .beacons
            .iter()
            .copied()
            .filter(|&beacon| world.contains_point(bay, world.pose(beacon).position))
            .collect();
    }

    fn apply<W: World>(&mut self, world: &mut W, action: &[f32], delta_time: f32) {
        let config = &self.config;
        let steer = (action[0] * config.max_steer_angle).to_radians();
        let throttle = action[1];
        let braking = action[2] > 0.5;

        let acceleration = throttle * config.motor_force / config.mass - config.drag * self.speed;
        self.speed += acceleration * delta_time;
        if braking {
            let slowdown = config.brake_force / config.mass * delta_time;
            self.speed = if self.speed.abs() <= slowdown {
                0.0
            } else {
                self.speed - slowdown * self.speed.signum()
            };
        }

        // Kinematic bicycle: yaw rate follows speed and steering angle
        let pose = world.pose(self.bodies.car);
        let yaw_rate = self.speed * steer.tan() / config.wheelbase;
        world.set_velocity(self.bodies.car, pose.forward() * self.speed);
        world.set_angular_velocity(self.bodies.car, Vec3::Y * yaw_rate);
    }

    fn evaluate<W: World>(
        &mut self,
        world: &mut W,
        events: &[ContactEvent],
        verdict: &mut Verdict,
    ) {
        self.track_beacons(events);

        let car = self.bodies.car;
        let crashed = [Tag::Car, Tag::Border]
            .into_iter()
            .any(|tag| ContactEvent::any_with(events, ContactKind::CollisionEnter, car, tag));
        if crashed {
            verdict.fire(TerminationCause::Collided, self.config.collision_penalty);
        }
        if self.parked_precisely(world) {
            verdict.fire(TerminationCause::ParkedPrecisely, self.config.parked_reward);
        }
        if self.in_bay.len() >= self.config.required_beacons {
            verdict.fire(TerminationCause::BeaconsInBay, self.config.beacon_reward);
        }
    }

    fn observe<W: World>(&self, world: &W) -> Vec<f32> {
        let car = world.pose(self.bodies.car);
        let bay = world.pose(self.bodies.bay);
        vec![
            car.position.x,
            car.position.z,
            car.euler_degrees().y,
            self.wheel_rpm(),
            bay.position.x,
            bay.position.z,
            bay.euler_degrees().y,
            car.position.distance(bay.position),
            self.in_bay.len() as f32,
        ]
    }
}

impl Heuristic for ParkingLot {
    fn heuristic(&self, input: &ManualInput) -> Vec<f32> {
        vec![input.horizontal, input.vertical, if input.brake { 1.0 } else { 0.0 }]
    }
}

/// Car pose that puts the car centred and aligned in the bay
pub fn bay_pose(config: &ParkingConfig) -> Pose {
    Pose::new(config.bay_position, yaw(config.bay_yaw))
}
