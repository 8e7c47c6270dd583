//! Voxel grid traversal
//!
//! From "A Fast Voxel Traversal Algorithm for Ray Tracing" by John Amanatides
//! and Andrew Woo (1987), extended with a distance limit and the face through
//! which each cell was entered.

use glam::{DVec3, IVec3};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::voxel::face::Face;

/// One cell visited by a traversal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayStep {
    pub cell: IVec3,
    /// Face of `cell` the ray came through; `None` for the starting cell.
    pub face: Option<Face>,
    /// Ray parameter at which the cell was entered, in units of the direction length.
    pub t: f64,
}

/// Iterator over the cells pierced by a ray, nearest first.
#[derive(Clone, Debug)]
pub struct VoxelTraversal {
    cell: IVec3,
    step: IVec3,
    t_max: DVec3,
    t_delta: DVec3,
    radius: f64,
    started: bool,
    done: bool,
}

impl VoxelTraversal {
    /// Start a traversal of at most `radius` world units from `origin`.
    ///
    /// `radius` may be infinite. Fails with [`Error::DegenerateDirection`] for a zero direction.
    pub fn new(origin: DVec3, direction: DVec3, radius: f64) -> Result<Self> {
        if direction == DVec3::ZERO || direction.is_nan() {
            return Err(Error::DegenerateDirection);
        }

        let step = IVec3::new(signum(direction.x), signum(direction.y), signum(direction.z));
        let t_max = DVec3::new(
            intbound(origin.x, direction.x),
            intbound(origin.y, direction.y),
            intbound(origin.z, direction.z),
        );
        let t_delta = step.as_dvec3() / direction;

        Ok(Self {
            cell: origin.floor().as_ivec3(),
            step,
            t_max,
            t_delta,
            // rescale from cube edges to units of the direction vector
            radius: radius / direction.length(),
            started: false,
            done: false,
        })
    }
}

impl Iterator for VoxelTraversal {
    type Item = RayStep;

    fn next(&mut self) -> Option<RayStep> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(RayStep { cell: self.cell, face: None, t: 0.0 });
        }

        let t = self.t_max;
        let axis = if t.x < t.y {
            if t.x < t.z { 0 } else { 2 }
        } else if t.y < t.z {
            1
        } else {
            2
        };

        if t[axis] > self.radius {
            self.done = true;
            return None;
        }

        let entered_at = t[axis];
        self.cell[axis] += self.step[axis];
        self.t_max[axis] += self.t_delta[axis];

        let positive = self.step[axis] > 0;
        let face = match (axis, positive) {
            (0, true) => Face::West,
            (0, false) => Face::East,
            (1, true) => Face::North,
            (1, false) => Face::South,
            (_, true) => Face::Down,
            (_, false) => Face::Up,
        };

        Some(RayStep { cell: self.cell, face: Some(face), t: entered_at })
    }
}

/// Visit cells along a ray until `visit` reports a hit or `radius` is exceeded.
///
/// Returns the cell for which `visit` returned true.
pub fn raycast<F>(origin: DVec3, direction: DVec3, radius: f64, mut visit: F) -> Result<Option<IVec3>>
where
    F: FnMut(IVec3, Option<Face>) -> bool,
{
    for step in VoxelTraversal::new(origin, direction, radius)? {
        if visit(step.cell, step.face) {
            return Ok(Some(step.cell));
        }
    }
    Ok(None)
}

/// Smallest positive t such that s + t * ds is an integer.
fn intbound(s: f64, ds: f64) -> f64 {
    if ds < 0.0 {
        intbound(-s, -ds)
    } else {
        (1.0 - s.rem_euclid(1.0)) / ds
    }
}

fn signum(x: f64) -> i32 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_direction_rejected() {
        let result = VoxelTraversal::new(DVec3::ZERO, DVec3::ZERO, 10.0);
        assert!(matches!(result, Err(Error::DegenerateDirection)));
        assert!(matches!(raycast(DVec3::ONE, DVec3::ZERO, 1.0, |_, _| true), Err(Error::DegenerateDirection)));
    }

    #[test]
    fn test_axis_aligned_walk() {
        let cells: Vec<RayStep> = VoxelTraversal::new(DVec3::new(0.5, 0.5, 0.5), DVec3::X, 3.0)
            .unwrap()
            .collect();

        let xs: Vec<i32> = cells.iter().map(|s| s.cell.x).collect();
        assert_eq!(xs, vec![0, 1, 2, 3]);
        assert!(cells.iter().all(|s| s.cell.y == 0 && s.cell.z == 0));
        assert_eq!(cells[0].face, None);
        assert!(cells[1..].iter().all(|s| s.face == Some(Face::West)));
    }

    #[test]
    fn test_negative_direction_faces() {
        let steps: Vec<RayStep> = VoxelTraversal::new(DVec3::new(0.5, 0.5, 0.5), DVec3::NEG_Z, 2.0)
            .unwrap()
            .collect();
        assert_eq!(steps.last().unwrap().cell, IVec3::new(0, 0, -2));
        assert!(steps[1..].iter().all(|s| s.face == Some(Face::Up)));

        let steps: Vec<RayStep> = VoxelTraversal::new(DVec3::new(0.5, 0.5, 0.5), DVec3::NEG_Y, 1.0)
            .unwrap()
            .collect();
        assert_eq!(steps[1].face, Some(Face::South));
    }

    #[test]
    fn test_radius_scales_with_direction_length() {
        let unit = VoxelTraversal::new(DVec3::splat(0.5), DVec3::X, 4.0).unwrap().count();
        let long = VoxelTraversal::new(DVec3::splat(0.5), DVec3::X * 10.0, 4.0).unwrap().count();
        assert_eq!(unit, long);
    }

    #[test]
    fn test_monotonic_parameter() {
        let directions = [
            DVec3::new(1.0, 0.3, -0.2),
            DVec3::new(-0.7, 0.7, 0.1),
            DVec3::new(0.01, -1.0, 0.5),
            DVec3::new(-1.0, -1.0, -1.0),
        ];
        for dir in directions {
            let steps: Vec<RayStep> = VoxelTraversal::new(DVec3::new(3.2, -7.9, 100.4), dir, 40.0)
                .unwrap()
                .collect();
            assert!(steps.len() > 10);
            for pair in steps.windows(2) {
                assert!(pair[1].t >= pair[0].t, "t went backwards: {:?}", pair);
                // successive cells are face neighbors
                let d = (pair[1].cell - pair[0].cell).abs();
                assert_eq!(d.x + d.y + d.z, 1);
            }
        }
    }

    #[test]
    fn test_raycast_stops_on_hit() {
        let hit = raycast(DVec3::new(0.5, 0.5, 10.5), DVec3::NEG_Z, 100.0, |cell, _| cell.z == 3).unwrap();
        assert_eq!(hit, Some(IVec3::new(0, 0, 3)));

        let miss = raycast(DVec3::new(0.5, 0.5, 10.5), DVec3::Z, 5.0, |cell, _| cell.z == 3).unwrap();
        assert_eq!(miss, None);
    }

    #[test]
    fn test_intbound() {
        assert!((intbound(0.25, 1.0) - 0.75).abs() < 1e-12);
        assert!((intbound(0.25, -1.0) - 0.25).abs() < 1e-12);
        assert!(intbound(0.5, 0.0).is_infinite());
        assert!((intbound(-0.25, 0.5) - 0.5).abs() < 1e-12);
    }
}
