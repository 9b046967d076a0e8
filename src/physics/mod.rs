//! Physics and timing collaborator
//!
//! The agent loops never integrate motion themselves. They query poses and
//! velocities, issue velocity/pose requests and consume the contact events a
//! [`World`] reports once per tick. [`KinematicWorld`] is a deterministic
//! stand-in used by the built-in arenas, tests and demos.

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

pub mod kinematic;

pub use kinematic::KinematicWorld;

/// Handle to a body owned by a [`World`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub usize);

/// Tag identifying what kind of entity a body is
///
/// Contact events carry the tag of the other party so scenarios can react
/// without looking the body up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Untagged,
    Board,
    Ball,
    Agent,
    Wall,
    Pellet,
    Car,
    CarBeacon,
    ParkingBay,
    Border,
    Cat,
    Mouse,
    Cheese,
    Exit,
}

/// Collision volume of a body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Sphere centred on the body position
    Sphere { radius: f32 },

    /// Oriented box centred on the body position
    Box { half_extents: Vec3 },
}

/// Position and orientation of a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    /// Create a pose from position and rotation
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Pose at `position` with no rotation
    pub fn at(position: Vec3) -> Self {
        Self { position, rotation: Quat::IDENTITY }
    }

    /// Local +Z axis in world space
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// Map a point from the body's local frame into world space
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    /// Map a world-space point into the body's local frame
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.position)
    }

    /// Euler angles in degrees, each wrapped to `[0, 360)`
    pub fn euler_degrees(&self) -> Vec3 {
        euler_degrees(self.rotation)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::at(Vec3::ZERO)
    }
}

/// Build a rotation from euler angles in degrees
///
/// Angles are applied Z first, then X, then Y, so `(x, y, z)` round-trips
/// through [`euler_degrees`] for pitch below 90°.
pub fn quat_from_euler_degrees(angles: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        angles.y.to_radians(),
        angles.x.to_radians(),
        angles.z.to_radians(),
    )
}

/// Decompose a rotation into `(x, y, z)` euler angles in degrees
pub fn euler_degrees(rotation: Quat) -> Vec3 {
    let (y, x, z) = rotation.to_euler(EulerRot::YXZ);
    Vec3::new(
        wrap_degrees(x.to_degrees()),
        wrap_degrees(y.to_degrees()),
        wrap_degrees(z.to_degrees()),
    )
}

/// Wrap an angle in degrees into `[0, 360)`
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round tiny negatives up to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Rotation of `degrees` about the world Y axis
pub fn yaw(degrees: f32) -> Quat {
    Quat::from_rotation_y(degrees.to_radians())
}

/// Everything needed to create a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySpec {
    pub tag: Tag,
    pub shape: Shape,
    pub pose: Pose,

    /// Trigger volumes report enter/exit instead of collisions
    pub trigger: bool,

    /// Parent body and local offset; attached bodies follow their parent
    pub parent: Option<(BodyId, Vec3)>,
}

impl BodySpec {
    /// Sphere of the given radius at the origin
    pub fn sphere(tag: Tag, radius: f32) -> Self {
        Self {
            tag,
            shape: Shape::Sphere { radius },
            pose: Pose::default(),
            trigger: false,
            parent: None,
        }
    }

    /// Box with the given half extents at the origin
    pub fn cuboid(tag: Tag, half_extents: Vec3) -> Self {
        Self {
            tag,
            shape: Shape::Box { half_extents },
            pose: Pose::default(),
            trigger: false,
            parent: None,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.pose.position = position;
        self
    }

    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.pose.rotation = rotation;
        self
    }

    pub fn trigger(mut self) -> Self {
        self.trigger = true;
        self
    }

    pub fn attached(mut self, parent: BodyId, offset: Vec3) -> Self {
        self.parent = Some((parent, offset));
        self
    }
}

/// Kind of contact transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactKind {
    TriggerEnter,
    TriggerExit,
    CollisionEnter,
}

/// Contact transition as seen from `body`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub kind: ContactKind,
    pub body: BodyId,
    pub other: BodyId,
    pub other_tag: Tag,
}

impl ContactEvent {
    /// True when this event is a `kind` transition seen from `body`
    pub fn is(&self, kind: ContactKind, body: BodyId) -> bool {
        self.kind == kind && self.body == body
    }

    /// True when `events` holds a `kind` transition between `body` and anything tagged `tag`
    pub fn any_with(events: &[ContactEvent], kind: ContactKind, body: BodyId, tag: Tag) -> bool {
        events.iter().any(|e| e.is(kind, body) && e.other_tag == tag)
    }
}

/// Physics/timing collaborator consumed by the agent loops
///
/// Body accessors panic on unknown ids: every id a scenario holds is
/// validated when the scenario is built.
pub trait World {
    /// Duration of one tick in seconds
    fn delta_time(&self) -> f32;

    /// Whether `body` exists
    fn contains(&self, body: BodyId) -> bool;

    fn tag(&self, body: BodyId) -> Tag;

    fn pose(&self, body: BodyId) -> Pose;

    /// Teleport a body; attached children follow immediately
    fn set_pose(&mut self, body: BodyId, pose: Pose);

    fn velocity(&self, body: BodyId) -> Vec3;

    fn set_velocity(&mut self, body: BodyId, velocity: Vec3);

    /// Angular velocity as a scaled axis, radians per second
    fn set_angular_velocity(&mut self, body: BodyId, angular_velocity: Vec3);

    fn spawn(&mut self, spec: BodySpec) -> BodyId;

    /// Remove a body; removing an unknown body is a no-op
    fn despawn(&mut self, body: BodyId);

    /// Inactive bodies neither move nor take part in contacts
    fn set_active(&mut self, body: BodyId, active: bool);

    fn is_active(&self, body: BodyId) -> bool;

    /// Whether a world-space point lies inside the body's volume
    fn contains_point(&self, body: BodyId, point: Vec3) -> bool;

    /// Advance one tick and report the contact transitions it produced
    fn advance(&mut self) -> Vec<ContactEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euler_round_trip() {
        let angles = Vec3::new(30.0, 200.0, 45.0);
        let back = euler_degrees(quat_from_euler_degrees(angles));
        assert!((back - angles).abs().max_element() < 1e-2, "got {back:?}");
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert!(wrap_degrees(-1e-9) < 360.0);
    }

    #[test]
    fn test_pose_forward_follows_yaw() {
        let pose = Pose::new(Vec3::ZERO, yaw(90.0));
        assert!((pose.forward() - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_pose_transform_round_trip() {
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), yaw(45.0));
        let local = Vec3::new(0.5, 0.0, -1.0);
        let world = pose.transform_point(local);
        assert!((pose.inverse_transform_point(world) - local).length() < 1e-5);
    }
}
