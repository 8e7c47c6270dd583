//! Axis-aligned bounding box in world space

use glam::IVec3;
use serde::{Deserialize, Serialize};

use crate::core::types::Vec3;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inclusive integer cell range touched by the box (floor of min, ceil of max)
    pub fn cell_range(&self) -> (IVec3, IVec3) {
        (self.min.floor().as_ivec3(), self.max.ceil().as_ivec3())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_range_is_floor_ceil() {
        let player = Aabb::new(Vec3::new(4.25, -0.75, 100.0), Vec3::new(4.75, -0.25, 101.5));
        let (min, max) = player.cell_range();
        assert_eq!(min, IVec3::new(4, -1, 100));
        assert_eq!(max, IVec3::new(5, 0, 102));
    }

    #[test]
    fn test_integral_corners_are_kept() {
        let aabb = Aabb::new(Vec3::new(-2.0, 3.0, 10.0), Vec3::new(-1.0, 4.0, 11.0));
        assert_eq!(aabb.cell_range(), (IVec3::new(-2, 3, 10), IVec3::new(-1, 4, 11)));
    }
}
