//! The six axis-aligned faces of a voxel

use glam::IVec3;
use serde::{Deserialize, Serialize};

/// Face of a voxel, named by the side it looks towards.
///
/// Discriminants are the face codes used throughout the engine
/// (mesher scratch buffers, light propagation directions).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Face {
    /// -y
    North = 0,
    /// +x
    East = 1,
    /// +y
    South = 2,
    /// -x
    West = 3,
    /// +z
    Up = 4,
    /// -z
    Down = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [Face::North, Face::East, Face::South, Face::West, Face::Up, Face::Down];

    /// Unit offset to the neighbor across this face.
    pub const fn offset(self) -> IVec3 {
        match self {
            Face::North => IVec3::new(0, -1, 0),
            Face::East => IVec3::new(1, 0, 0),
            Face::South => IVec3::new(0, 1, 0),
            Face::West => IVec3::new(-1, 0, 0),
            Face::Up => IVec3::new(0, 0, 1),
            Face::Down => IVec3::new(0, 0, -1),
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn opposite(self) -> Face {
        match self {
            Face::North => Face::South,
            Face::East => Face::West,
            Face::South => Face::North,
            Face::West => Face::East,
            Face::Up => Face::Down,
            Face::Down => Face::Up,
        }
    }

    /// Whether the face normal points down an axis.
    pub const fn is_negative(self) -> bool {
        matches!(self, Face::North | Face::West | Face::Down)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_cancel_with_opposite() {
        for face in Face::ALL {
            assert_eq!(face.offset() + face.opposite().offset(), IVec3::ZERO);
            assert_eq!(face.opposite().opposite(), face);
        }
    }

    #[test]
    fn test_index_matches_order() {
        for (i, face) in Face::ALL.iter().enumerate() {
            assert_eq!(face.index(), i);
        }
    }

    #[test]
    fn test_negative_faces() {
        let negative: Vec<Face> = Face::ALL.into_iter().filter(|f| f.is_negative()).collect();
        assert_eq!(negative, vec![Face::North, Face::West, Face::Down]);
        for face in negative {
            let o = face.offset();
            assert!(o.x + o.y + o.z < 0);
        }
    }
}
