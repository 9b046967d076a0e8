//! Deterministic kinematic world
//!
//! Bodies move with whatever linear/angular velocity they were given, attached
//! bodies follow their parent, and overlaps are diffed tick to tick to produce
//! contact events. There is no gravity, no force integration and no collision
//! resolution: overlapping solids stay overlapping.

use std::collections::BTreeSet;

use glam::{Quat, Vec3};

use super::{BodyId, BodySpec, ContactEvent, ContactKind, Pose, Shape, Tag, World};

#[derive(Debug, Clone)]
struct Body {
    spec: BodySpec,
    pose: Pose,
    velocity: Vec3,
    angular_velocity: Vec3,
    active: bool,
}

impl Body {
    fn related_to(&self, id: BodyId, other: &Body, other_id: BodyId) -> bool {
        let parent = self.spec.parent.map(|(p, _)| p);
        let other_parent = other.spec.parent.map(|(p, _)| p);
        parent == Some(other_id)
            || other_parent == Some(id)
            || (parent.is_some() && parent == other_parent)
    }
}

/// In-memory [`World`] with a fixed tick
#[derive(Debug, Clone)]
pub struct KinematicWorld {
    delta_time: f32,
    time: f32,
    bodies: Vec<Option<Body>>,
    /// Overlapping pairs from the previous tick, lower id first
    contacts: BTreeSet<(BodyId, BodyId)>,
}

impl KinematicWorld {
    /// Create an empty world ticking `delta_time` seconds per step
    pub fn new(delta_time: f32) -> Self {
        Self { delta_time, time: 0.0, bodies: Vec::new(), contacts: BTreeSet::new() }
    }

    /// Total simulated time in seconds
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Live bodies carrying `tag`, in creation order
    pub fn bodies_with_tag(&self, tag: Tag) -> Vec<BodyId> {
        self.bodies
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().filter(|b| b.spec.tag == tag).map(|_| BodyId(i)))
            .collect()
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.bodies.iter().flatten().count()
    }

    fn body(&self, id: BodyId) -> &Body {
        match self.bodies.get(id.0).and_then(Option::as_ref) {
            Some(body) => body,
            None => panic!("unknown body {id:?}"),
        }
    }

    fn body_mut(&mut self, id: BodyId) -> &mut Body {
        match self.bodies.get_mut(id.0).and_then(Option::as_mut) {
            Some(body) => body,
            None => panic!("unknown body {id:?}"),
        }
    }

    fn sync_children(&mut self) {
        for index in 0..self.bodies.len() {
            let Some((parent, offset)) = self.bodies[index].as_ref().and_then(|b| b.spec.parent)
            else {
                continue;
            };
            let Some(parent_pose) =
                self.bodies.get(parent.0).and_then(Option::as_ref).map(|p| p.pose)
            else {
                continue;
            };
            if let Some(child) = self.bodies[index].as_mut() {
                child.pose = Pose::new(parent_pose.transform_point(offset), parent_pose.rotation);
            }
        }
    }

    fn detect_contacts(&mut self) -> Vec<ContactEvent> {
        let live: Vec<(BodyId, &Body)> = self
            .bodies
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().filter(|b| b.active).map(|b| (BodyId(i), b)))
            .collect();

        let mut current = BTreeSet::new();
        let mut events = Vec::new();

        for (i, &(id_a, a)) in live.iter().enumerate() {
            for &(id_b, b) in &live[i + 1..] {
                if a.related_to(id_a, b, id_b) || !overlaps(a, b) {
                    continue;
                }
                current.insert((id_a, id_b));
                if self.contacts.contains(&(id_a, id_b)) {
                    continue;
                }
                let kind = if a.spec.trigger || b.spec.trigger {
                    ContactKind::TriggerEnter
                } else {
                    ContactKind::CollisionEnter
                };
                events.push(ContactEvent { kind, body: id_a, other: id_b, other_tag: b.spec.tag });
                events.push(ContactEvent { kind, body: id_b, other: id_a, other_tag: a.spec.tag });
            }
        }

        for &(id_a, id_b) in self.contacts.difference(&current) {
            let lookup =
                |id: BodyId| self.bodies.get(id.0).and_then(Option::as_ref).filter(|b| b.active);
            let (Some(a), Some(b)) = (lookup(id_a), lookup(id_b)) else {
                continue;
            };
            if a.spec.trigger || b.spec.trigger {
                let kind = ContactKind::TriggerExit;
                events.push(ContactEvent { kind, body: id_a, other: id_b, other_tag: b.spec.tag });
                events.push(ContactEvent { kind, body: id_b, other: id_a, other_tag: a.spec.tag });
            }
        }

        self.contacts = current;
        events
    }
}

impl World for KinematicWorld {
    fn delta_time(&self) -> f32 {
        self.delta_time
    }

    fn contains(&self, body: BodyId) -> bool {
        matches!(self.bodies.get(body.0), Some(Some(_)))
    }

    fn tag(&self, body: BodyId) -> Tag {
        self.body(body).spec.tag
    }

    fn pose(&self, body: BodyId) -> Pose {
        self.body(body).pose
    }

    fn set_pose(&mut self, body: BodyId, pose: Pose) {
        self.body_mut(body).pose = pose;
        self.sync_children();
    }

    fn velocity(&self, body: BodyId) -> Vec3 {
        self.body(body).velocity
    }

    fn set_velocity(&mut self, body: BodyId, velocity: Vec3) {
        self.body_mut(body).velocity = velocity;
    }

    fn set_angular_velocity(&mut self, body: BodyId, angular_velocity: Vec3) {
        self.body_mut(body).angular_velocity = angular_velocity;
    }

    fn spawn(&mut self, spec: BodySpec) -> BodyId {
        let id = BodyId(self.bodies.len());
        let body = Body {
            spec,
            pose: spec.pose,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            active: true,
        };
        self.bodies.push(Some(body));
        if spec.parent.is_some() {
            self.sync_children();
        }
        id
    }

    fn despawn(&mut self, body: BodyId) {
        if let Some(slot) = self.bodies.get_mut(body.0) {
            *slot = None;
        }
        self.contacts.retain(|&(a, b)| a != body && b != body);
    }

    fn set_active(&mut self, body: BodyId, active: bool) {
        self.body_mut(body).active = active;
        if !active {
            self.contacts.retain(|&(a, b)| a != body && b != body);
        }
    }

    fn is_active(&self, body: BodyId) -> bool {
        self.body(body).active
    }

    fn contains_point(&self, body: BodyId, point: Vec3) -> bool {
        let body = self.body(body);
        let local = body.pose.inverse_transform_point(point);
        match body.spec.shape {
            Shape::Sphere { radius } => local.length_squared() <= radius * radius,
            Shape::Box { half_extents } => local.abs().cmple(half_extents).all(),
        }
    }

    fn advance(&mut self) -> Vec<ContactEvent> {
        let dt = self.delta_time;
        for body in self.bodies.iter_mut().flatten() {
            if !body.active || body.spec.parent.is_some() {
                continue;
            }
            body.pose.position += body.velocity * dt;
            if body.angular_velocity != Vec3::ZERO {
                let spin = Quat::from_scaled_axis(body.angular_velocity * dt);
                body.pose.rotation = (spin * body.pose.rotation).normalize();
            }
        }
        self.sync_children();
        self.time += dt;
        self.detect_contacts()
    }
}

fn overlaps(a: &Body, b: &Body) -> bool {
    match (a.spec.shape, b.spec.shape) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            let reach = ra + rb;
            a.pose.position.distance_squared(b.pose.position) <= reach * reach
        }
        (Shape::Sphere { radius }, Shape::Box { half_extents }) => {
            sphere_box_overlap(a.pose.position, radius, &b.pose, half_extents)
        }
        (Shape::Box { half_extents }, Shape::Sphere { radius }) => {
            sphere_box_overlap(b.pose.position, radius, &a.pose, half_extents)
        }
        (Shape::Box { half_extents: ha }, Shape::Box { half_extents: hb }) => {
            boxes_overlap(&a.pose, ha, &b.pose, hb)
        }
    }
}

fn sphere_box_overlap(center: Vec3, radius: f32, pose: &Pose, half_extents: Vec3) -> bool {
    let local = pose.inverse_transform_point(center);
    let closest = local.clamp(-half_extents, half_extents);
    local.distance_squared(closest) <= radius * radius
}

/// Separating-axis test for two oriented boxes
fn boxes_overlap(a: &Pose, ha: Vec3, b: &Pose, hb: Vec3) -> bool {
    let axes_a = [a.rotation * Vec3::X, a.rotation * Vec3::Y, a.rotation * Vec3::Z];
    let axes_b = [b.rotation * Vec3::X, b.rotation * Vec3::Y, b.rotation * Vec3::Z];
    let delta = b.position - a.position;

    let mut axes: Vec<Vec3> = axes_a.iter().chain(axes_b.iter()).copied().collect();
    for ua in axes_a {
        for ub in axes_b {
            let cross = ua.cross(ub);
            // parallel edges add nothing the face axes don't cover
            if cross.length_squared() > 1e-6 {
                axes.push(cross.normalize());
            }
        }
    }

    axes.iter().all(|&axis| {
        let reach = projected_radius(&axes_a, ha, axis) + projected_radius(&axes_b, hb, axis);
        delta.dot(axis).abs() <= reach
    })
}

fn projected_radius(axes: &[Vec3; 3], half_extents: Vec3, axis: Vec3) -> f32 {
    axes[0].dot(axis).abs() * half_extents.x
        + axes[1].dot(axis).abs() * half_extents.y
        + axes[2].dot(axis).abs() * half_extents.z
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::yaw;

    fn ball(world: &mut KinematicWorld, x: f32) -> BodyId {
        world.spawn(BodySpec::sphere(Tag::Ball, 0.5).at(Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn test_velocity_integration() {
        let mut world = KinematicWorld::new(0.5);
        let id = ball(&mut world, 0.0);
        world.set_velocity(id, Vec3::new(2.0, 0.0, 0.0));
        world.advance();
        world.advance();
        assert!((world.pose(id).position.x - 2.0).abs() < 1e-6);
        assert!((world.time() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_collision_enter_fires_once() {
        let mut world = KinematicWorld::new(0.1);
        let a = ball(&mut world, 0.0);
        let b = ball(&mut world, 0.8);

        let events = world.advance();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == ContactKind::CollisionEnter));
        assert!(events.iter().any(|e| e.body == a && e.other == b && e.other_tag == Tag::Ball));

        // Still overlapping: no new events
        assert!(world.advance().is_empty());
    }

    #[test]
    fn test_trigger_enter_and_exit() {
        let mut world = KinematicWorld::new(1.0);
        let zone = world.spawn(BodySpec::cuboid(Tag::ParkingBay, Vec3::ONE).trigger());
        let probe = ball(&mut world, 5.0);

        assert!(world.advance().is_empty());

        world.set_pose(probe, Pose::at(Vec3::ZERO));
        let events = world.advance();
        assert!(events.iter().any(|e| e.is(ContactKind::TriggerEnter, zone) && e.other == probe));

        world.set_pose(probe, Pose::at(Vec3::new(5.0, 0.0, 0.0)));
        let events = world.advance();
        assert!(events.iter().any(|e| e.is(ContactKind::TriggerExit, zone) && e.other == probe));
    }

    #[test]
    fn test_attached_bodies_follow_parent() {
        let mut world = KinematicWorld::new(0.1);
        let parent = world.spawn(BodySpec::cuboid(Tag::Car, Vec3::ONE));
        let child =
            world.spawn(BodySpec::sphere(Tag::CarBeacon, 0.1).trigger().attached(parent, Vec3::Z));

        world.set_pose(parent, Pose::new(Vec3::new(3.0, 0.0, 0.0), yaw(90.0)));
        let child_pos = world.pose(child).position;
        assert!((child_pos - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-5);

        // Parent and child never report contacts with each other
        assert!(world.advance().is_empty());
    }

    #[test]
    fn test_inactive_bodies_do_not_touch() {
        let mut world = KinematicWorld::new(0.1);
        let a = ball(&mut world, 0.0);
        let _b = ball(&mut world, 0.5);
        world.set_active(a, false);
        assert!(world.advance().is_empty());
    }

    #[test]
    fn test_despawn() {
        let mut world = KinematicWorld::new(0.1);
        let a = ball(&mut world, 0.0);
        assert!(world.contains(a));
        world.despawn(a);
        assert!(!world.contains(a));
        world.despawn(a);
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_rotated_boxes() {
        let a = Pose::at(Vec3::ZERO);
        let b = Pose::new(Vec3::new(2.2, 0.0, 0.0), yaw(45.0));
        // Rotated corner reaches ~1.41 from b's centre toward a
        assert!(boxes_overlap(&a, Vec3::ONE, &b, Vec3::ONE));
        let far = Pose::new(Vec3::new(2.5, 0.0, 0.0), yaw(45.0));
        assert!(!boxes_overlap(&a, Vec3::ONE, &far, Vec3::ONE));
    }

    #[test]
    fn test_contains_point() {
        let mut world = KinematicWorld::new(0.1);
        let zone = world.spawn(BodySpec::cuboid(Tag::ParkingBay, Vec3::new(1.0, 0.5, 2.0)));
        assert!(world.contains_point(zone, Vec3::new(0.9, 0.0, 1.9)));
        assert!(!world.contains_point(zone, Vec3::new(1.1, 0.0, 0.0)));
    }
}
