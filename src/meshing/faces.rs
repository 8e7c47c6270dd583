//! Per-face geometry table used by the mesher
//!
//! For each of the six faces (in [`Face`] order) this lists the four quad
//! corners, the ring of eight voxels in front of the face used for ambient
//! occlusion, and which neighbor faces decide whether a corner glints.

use glam::IVec3;

use crate::voxel::face::Face;

/// One corner of a face quad.
#[derive(Clone, Copy, Debug)]
pub struct Corner {
    /// Corner position relative to the voxel's min corner, in units of the quad size.
    pub offset: [i32; 3],
    /// Indices into [`FaceGeometry::neighbors`] averaged into this corner.
    pub aos: [usize; 3],
    /// Faces that must both be exposed for the corner to glint.
    pub masks: [usize; 2],
}

/// Geometry of one voxel face.
#[derive(Clone, Copy, Debug)]
pub struct FaceGeometry {
    pub corners: [Corner; 4],
    /// Eight voxels around the face's neighbor, clockwise; even entries are edges.
    pub neighbors: [[i32; 3]; 8],
}

const fn corner(offset: [i32; 3], aos: [usize; 3], masks: [usize; 2]) -> Corner {
    Corner { offset, aos, masks }
}

pub static FACES: [FaceGeometry; 6] = [
    // north
    FaceGeometry {
        corners: [
            corner([1, 0, 1], [0, 1, 2], [4, 1]),
            corner([0, 0, 1], [6, 7, 0], [4, 3]),
            corner([1, 0, 0], [2, 3, 4], [5, 1]),
            corner([0, 0, 0], [4, 5, 6], [5, 3]),
        ],
        neighbors: [
            [0, -1, 1], [1, -1, 1], [1, -1, 0], [1, -1, -1],
            [0, -1, -1], [-1, -1, -1], [-1, -1, 0], [-1, -1, 1],
        ],
    },
    // east
    FaceGeometry {
        corners: [
            corner([1, 1, 1], [6, 7, 0], [4, 2]),
            corner([1, 0, 1], [0, 1, 2], [4, 0]),
            corner([1, 1, 0], [4, 5, 6], [5, 2]),
            corner([1, 0, 0], [2, 3, 4], [5, 0]),
        ],
        neighbors: [
            [1, 0, 1], [1, -1, 1], [1, -1, 0], [1, -1, -1],
            [1, 0, -1], [1, 1, -1], [1, 1, 0], [1, 1, 1],
        ],
    },
    // south
    FaceGeometry {
        corners: [
            corner([0, 1, 1], [6, 7, 0], [4, 3]),
            corner([1, 1, 1], [0, 1, 2], [4, 1]),
            corner([0, 1, 0], [4, 5, 6], [5, 3]),
            corner([1, 1, 0], [2, 3, 4], [5, 1]),
        ],
        neighbors: [
            [0, 1, 1], [1, 1, 1], [1, 1, 0], [1, 1, -1],
            [0, 1, -1], [-1, 1, -1], [-1, 1, 0], [-1, 1, 1],
        ],
    },
    // west
    FaceGeometry {
        corners: [
            corner([0, 0, 1], [0, 1, 2], [4, 0]),
            corner([0, 1, 1], [6, 7, 0], [4, 2]),
            corner([0, 0, 0], [2, 3, 4], [5, 0]),
            corner([0, 1, 0], [4, 5, 6], [5, 2]),
        ],
        neighbors: [
            [-1, 0, 1], [-1, -1, 1], [-1, -1, 0], [-1, -1, -1],
            [-1, 0, -1], [-1, 1, -1], [-1, 1, 0], [-1, 1, 1],
        ],
    },
    // up
    FaceGeometry {
        corners: [
            corner([0, 0, 1], [6, 7, 0], [0, 3]),
            corner([1, 0, 1], [0, 1, 2], [0, 1]),
            corner([0, 1, 1], [4, 5, 6], [2, 3]),
            corner([1, 1, 1], [2, 3, 4], [2, 1]),
        ],
        neighbors: [
            [0, -1, 1], [1, -1, 1], [1, 0, 1], [1, 1, 1],
            [0, 1, 1], [-1, 1, 1], [-1, 0, 1], [-1, -1, 1],
        ],
    },
    // down
    FaceGeometry {
        corners: [
            corner([1, 1, 0], [2, 3, 4], [2, 1]),
            corner([1, 0, 0], [0, 1, 2], [0, 1]),
            corner([0, 1, 0], [4, 5, 6], [2, 3]),
            corner([0, 0, 0], [6, 7, 0], [0, 3]),
        ],
        neighbors: [
            [0, -1, -1], [1, -1, -1], [1, 0, -1], [1, 1, -1],
            [0, 1, -1], [-1, 1, -1], [-1, 0, -1], [-1, -1, -1],
        ],
    },
];

/// Merge axes for a face: primary (tightest), secondary, and the slice axis normal to the face.
pub fn merge_axes(face: Face) -> [IVec3; 3] {
    match face {
        Face::North | Face::South => [IVec3::X, IVec3::Z, IVec3::Y],
        Face::East | Face::West => [IVec3::Y, IVec3::Z, IVec3::X],
        Face::Up | Face::Down => [IVec3::Y, IVec3::X, IVec3::Z],
    }
}

impl FaceGeometry {
    pub fn of(face: Face) -> &'static FaceGeometry {
        &FACES[face.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners_lie_on_face_plane() {
        for face in Face::ALL {
            let normal = face.offset();
            let geometry = FaceGeometry::of(face);
            // corners on a positive face sit at 1 along the normal, 0 on a negative face
            let expected = if face.is_negative() { 0 } else { 1 };
            for c in geometry.corners {
                let along = IVec3::from(c.offset).dot(normal.abs());
                assert_eq!(along, expected, "{face:?}");
            }
        }
    }

    #[test]
    fn test_neighbors_sit_in_front_of_face() {
        for face in Face::ALL {
            let normal = face.offset();
            for n in FaceGeometry::of(face).neighbors {
                assert_eq!(IVec3::from(n).dot(normal), 1, "{face:?}");
            }
        }
    }

    #[test]
    fn test_merge_axes_span_face_plane() {
        for face in Face::ALL {
            let [primary, secondary, slice] = merge_axes(face);
            assert_eq!(slice, face.offset().abs());
            assert_eq!(primary.dot(slice), 0);
            assert_eq!(secondary.dot(slice), 0);
        }
    }
}
