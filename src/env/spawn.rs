//! Placement services
//!
//! - [`scatter`]: overlap-avoiding random placement, used for pellets
//! - [`SpawnPoints`]: a fixed set of spawn points drawn without replacement

use std::collections::BTreeSet;

use glam::Vec3;
use rand::Rng;

use super::EnvError;

/// Square area on the horizontal plane where items may be placed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterArea {
    /// Items are placed with x and z in `[-half_extent, half_extent]`
    pub half_extent: f32,
    /// Every item gets this y
    pub height: f32,
}

/// Outcome of a [`scatter`] run
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub positions: Vec<Vec3>,
    /// Items that ran out of attempts and took their best candidate
    pub fallbacks: usize,
}

/// Place `count` items at least `min_separation` apart from each other and
/// from every point in `avoid`
///
/// Each item gets up to `max_attempts` uniform samples (at least one). When
/// none is clear, the sample with the largest clearance is used, so dense
/// layouts degrade instead of looping forever.
pub fn scatter<R: Rng>(
    count: usize,
    area: ScatterArea,
    avoid: &[Vec3],
    min_separation: f32,
    max_attempts: usize,
    rng: &mut R,
) -> Placement {
    let mut positions: Vec<Vec3> = Vec::with_capacity(count);
    let mut fallbacks = 0;

    for item in 0..count {
        let mut best: Option<(Vec3, f32)> = None;
        let mut accepted = None;

        for _ in 0..max_attempts.max(1) {
            let candidate = sample(area, rng);
            let clearance = avoid
                .iter()
                .chain(positions.iter())
                .map(|other| candidate.distance(*other))
                .fold(f32::INFINITY, f32::min);
            if clearance > min_separation {
                accepted = Some(candidate);
                break;
            }
            if best.map_or(true, |(_, c)| clearance > c) {
                best = Some((candidate, clearance));
            }
        }

        let position = match (accepted, best) {
            (Some(position), _) => position,
            (None, Some((position, clearance))) => {
                fallbacks += 1;
                tracing::warn!(
                    item,
                    clearance,
                    min_separation,
                    "placement attempts exhausted; using best candidate"
                );
                position
            }
            // max_attempts.max(1) guarantees at least one sample
            (None, None) => sample(area, rng),
        };
        positions.push(position);
    }

    Placement { positions, fallbacks }
}

fn sample<R: Rng>(area: ScatterArea, rng: &mut R) -> Vec3 {
    let h = area.half_extent;
    Vec3::new(rng.gen_range(-h..=h), area.height, rng.gen_range(-h..=h))
}

/// Fixed spawn points handed out without replacement
///
/// Once every point has been used the pool refills, so consecutive draws only
/// repeat a point after all others have been used.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPoints {
    points: Vec<Vec3>,
    used: BTreeSet<usize>,
}

impl SpawnPoints {
    pub fn new(points: Vec<Vec3>) -> Result<Self, EnvError> {
        if points.is_empty() {
            return Err(EnvError::InvalidConfig("spawn point list is empty".into()));
        }
        Ok(Self { points, used: BTreeSet::new() })
    }

    /// Draw a point not used since the last refill
    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> Vec3 {
        if self.used.len() == self.points.len() {
            tracing::debug!(points = self.points.len(), "all spawn points used; refilling");
            self.used.clear();
        }
        let available: Vec<usize> =
            (0..self.points.len()).filter(|i| !self.used.contains(i)).collect();
        let index = available[rng.gen_range(0..available.len())];
        self.used.insert(index);
        self.points[index]
    }

    /// Move `current` onto a drawn point, keeping its height
    pub fn place<R: Rng>(&mut self, current: Vec3, rng: &mut R) -> Vec3 {
        let point = self.draw(rng);
        Vec3::new(point.x, current.y, point.z)
    }

    /// Points still available before the next refill
    pub fn remaining(&self) -> usize {
        self.points.len() - self.used.len()
    }

    /// Make every point available again
    pub fn reset(&mut self) {
        self.used.clear();
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const AREA: ScatterArea = ScatterArea { half_extent: 4.75, height: 0.25 };

    #[test]
    fn test_scatter_respects_separation_when_possible() {
        let mut rng = StdRng::seed_from_u64(3);
        let agent = Vec3::new(0.0, 0.25, 0.0);
        let placement = scatter(4, AREA, &[agent], 1.5, 200, &mut rng);

        assert_eq!(placement.positions.len(), 4);
        assert_eq!(placement.fallbacks, 0);
        for (i, a) in placement.positions.iter().enumerate() {
            assert!(a.distance(agent) > 1.5);
            assert!(a.x.abs() <= 4.75 && a.z.abs() <= 4.75);
            assert_eq!(a.y, 0.25);
            for b in &placement.positions[i + 1..] {
                assert!(a.distance(*b) > 1.5);
            }
        }
    }

    #[test]
    fn test_scatter_terminates_on_impossible_layout() {
        let mut rng = StdRng::seed_from_u64(3);
        // Nothing fits 100 units apart inside a 9.5 wide square
        let placement = scatter(5, AREA, &[Vec3::ZERO], 100.0, 8, &mut rng);
        assert_eq!(placement.positions.len(), 5);
        assert_eq!(placement.fallbacks, 5);
    }

    #[test]
    fn test_scatter_zero_attempts_still_places() {
        let mut rng = StdRng::seed_from_u64(1);
        let placement = scatter(2, AREA, &[], 0.0, 0, &mut rng);
        assert_eq!(placement.positions.len(), 2);
    }

    #[test]
    fn test_spawn_points_cycle_without_replacement() {
        let mut rng = StdRng::seed_from_u64(9);
        let points = vec![Vec3::X, Vec3::Y, Vec3::Z];
        let mut spawns = SpawnPoints::new(points.clone()).unwrap();

        let mut drawn: Vec<Vec3> = (0..3).map(|_| spawns.draw(&mut rng)).collect();
        assert_eq!(spawns.remaining(), 0);
        drawn.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        let mut expected = points;
        expected.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        assert_eq!(drawn, expected);

        // Pool refills instead of failing
        spawns.draw(&mut rng);
        assert_eq!(spawns.remaining(), 2);
    }

    #[test]
    fn test_spawn_points_keep_height() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut spawns = SpawnPoints::new(vec![Vec3::new(2.0, 9.0, 3.0)]).unwrap();
        assert_eq!(spawns.place(Vec3::new(0.0, 0.5, 0.0), &mut rng), Vec3::new(2.0, 0.5, 3.0));
    }

    #[test]
    fn test_empty_spawn_points_rejected() {
        assert!(SpawnPoints::new(Vec::new()).is_err());
    }
}
