//! Fixed-size chunk buffers and their indexing arithmetic

use glam::{DVec2, IVec2, IVec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

use crate::terrain::biome::Biome;
use crate::terrain::structures::Structure;
use crate::voxel::block::{AIR, BlockId};

/// Chunk extent along x
pub const CHUNK_WIDTH: usize = 16;
/// Chunk extent along y
pub const CHUNK_HEIGHT: usize = 16;
/// Chunk extent along z (world height)
pub const CHUNK_DEPTH: usize = 256;
/// Columns per chunk
pub const CHUNK_AREA: usize = CHUNK_WIDTH * CHUNK_HEIGHT;
/// Voxels per chunk
pub const CHUNK_VOLUME: usize = CHUNK_AREA * CHUNK_DEPTH;

/// Brightest light level.
pub const MAX_LIGHT: u8 = 15;

/// Index of a chunk-local voxel in the voxel and light buffers.
#[inline]
pub fn index3d(x: usize, y: usize, z: usize) -> usize {
    z + CHUNK_DEPTH * (y + CHUNK_WIDTH * x)
}

/// Index of a chunk-local column in the height buffer.
#[inline]
pub fn index2d(x: usize, y: usize) -> usize {
    x + CHUNK_HEIGHT * y
}

/// Integer coordinate identifying a chunk in the world grid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Pairing id over signed coordinates.
    ///
    /// Folds each axis onto the naturals (0, -1, 1, -2, ... -> 0, 1, 2, 3, ...)
    /// and combines them with Szudzik's elegant pairing.
    pub fn id(&self) -> u64 {
        let a = fold(self.x);
        let b = fold(self.y);
        if a >= b { a * a + a + b } else { a + b * b }
    }

    /// Recover the coordinate from an id produced by [`ChunkCoord::id`].
    pub fn from_id(id: u64) -> Self {
        let s = id.isqrt();
        let rest = id - s * s;
        let (a, b) = if rest < s { (rest, s) } else { (s, rest - s) };
        Self { x: unfold(a), y: unfold(b) }
    }

    /// Chunk containing the world column (x, y), plus the local column inside it.
    pub fn containing(x: i32, y: i32) -> (Self, usize, usize) {
        let cx = x.div_euclid(CHUNK_WIDTH as i32);
        let cy = y.div_euclid(CHUNK_HEIGHT as i32);
        (
            Self::new(cx, cy),
            x.rem_euclid(CHUNK_WIDTH as i32) as usize,
            y.rem_euclid(CHUNK_HEIGHT as i32) as usize,
        )
    }

    /// World-space column of this chunk's local (0, 0).
    pub fn world_origin(&self) -> IVec2 {
        IVec2::new(self.x * CHUNK_WIDTH as i32, self.y * CHUNK_HEIGHT as i32)
    }

    /// World-space center of the chunk footprint.
    pub fn world_center(&self) -> DVec2 {
        DVec2::new(
            (self.x as f64 + 0.5) * CHUNK_WIDTH as f64,
            (self.y as f64 + 0.5) * CHUNK_HEIGHT as f64,
        )
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Euclidean distance in chunk units.
    pub fn distance(&self, other: ChunkCoord) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

fn fold(v: i32) -> u64 {
    let v = v as i64;
    if v >= 0 { (2 * v) as u64 } else { (-2 * v - 1) as u64 }
}

fn unfold(v: u64) -> i32 {
    if v % 2 == 0 { (v / 2) as i32 } else { -(((v + 1) / 2) as i64) as i32 }
}

/// Lifecycle of a chunk. Each stage implies all earlier ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Unknown,
    BiomeAssigned,
    Seeded,
    Generated,
    Populated,
    Lit,
    MeshReady,
}

/// Deterministic random stream owned by one chunk during generation.
#[derive(Clone, Debug)]
pub struct ChunkRng(Pcg64Mcg);

impl ChunkRng {
    /// Stream keyed by world seed and chunk id.
    pub fn new(seed: u32, id: u64) -> Self {
        let key = ((seed as u64) << 32) ^ id.rotate_left(17) ^ 0x9E37_79B9_7F4A_7C15;
        Self(Pcg64Mcg::seed_from_u64(key))
    }

    /// Uniform sample in [0, 1).
    pub fn next(&mut self) -> f64 {
        self.0.gen_range(0.0..1.0)
    }

    /// Uniform integer in [0, bound).
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next() * bound as f64).floor() as usize
    }
}

/// Endpoint of a cave tunnel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaveSeed {
    pub position: IVec3,
    pub radius: f64,
}

/// One 16x16x256 column of the world.
#[derive(Debug)]
pub struct Chunk {
    pub coord: ChunkCoord,
    pub id: u64,
    pub stage: Stage,
    /// Biome from noise thresholds alone, before river overrides.
    pub initial_biome: Option<Biome>,
    pub biome: Option<Biome>,
    pub rng: Option<ChunkRng>,
    /// Jittered world-space center used for biome blending.
    pub center: DVec2,
    pub rough_height: f64,
    pub cave_budget: i32,
    pub caves: Vec<CaveSeed>,
    pub voxels: Option<Vec<BlockId>>,
    pub lights: Option<Vec<u8>>,
    pub heights: Option<Vec<u8>>,
    pub average_height: f64,
    /// Deferred structures, replayed last-in first-out.
    pub structures: Vec<Structure>,
    pub mesh_dirty: bool,
    pub mesh_pending: bool,
}

impl Chunk {
    /// Create a new empty chunk at the given coordinate
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            id: coord.id(),
            stage: Stage::Unknown,
            initial_biome: None,
            biome: None,
            rng: None,
            center: coord.world_center(),
            rough_height: 0.0,
            cave_budget: 0,
            caves: Vec::new(),
            voxels: None,
            lights: None,
            heights: None,
            average_height: 0.0,
            structures: Vec::new(),
            mesh_dirty: false,
            mesh_pending: false,
        }
    }

    /// Whether voxel and height buffers exist.
    pub fn is_generated(&self) -> bool {
        self.voxels.is_some() && self.heights.is_some()
    }

    /// Block at a chunk-local position, Air when ungenerated.
    pub fn at(&self, x: usize, y: usize, z: usize) -> BlockId {
        self.voxels.as_ref().map_or(AIR, |v| v[index3d(x, y, z)])
    }

    /// Light at a chunk-local position, 0 when unlit.
    pub fn light(&self, x: usize, y: usize, z: usize) -> u8 {
        self.lights.as_ref().map_or(0, |l| l[index3d(x, y, z)])
    }

    /// Cached column height, 0 when ungenerated.
    pub fn height(&self, x: usize, y: usize) -> u8 {
        self.heights.as_ref().map_or(0, |h| h[index2d(x, y)])
    }

    /// Install voxel and height buffers from an external snapshot.
    pub fn install(&mut self, voxels: Vec<BlockId>, lights: Vec<u8>, heights: Vec<u8>, biome: Biome) {
        self.voxels = Some(voxels);
        self.lights = Some(lights);
        self.heights = Some(heights);
        self.biome = Some(biome);
        self.stage = self.stage.max(Stage::Lit);
        self.mesh_dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_index_layout() {
        assert_eq!(index3d(0, 0, 0), 0);
        assert_eq!(index3d(0, 0, 1), 1);
        assert_eq!(index3d(0, 1, 0), CHUNK_DEPTH);
        assert_eq!(index3d(1, 0, 0), CHUNK_DEPTH * CHUNK_WIDTH);
        assert_eq!(index3d(15, 15, 255), CHUNK_VOLUME - 1);
        assert_eq!(index2d(1, 0), 1);
        assert_eq!(index2d(0, 1), CHUNK_HEIGHT);
    }

    #[test]
    fn test_pairing_known_values() {
        assert_eq!(ChunkCoord::new(0, 0).id(), 0);
        // folded (0, 1) -> a=0, b=2 -> 0 + 4
        assert_eq!(ChunkCoord::new(0, 1).id(), 4);
        // folded (-1, 0) -> a=1, b=0 -> 1 + 1 + 0
        assert_eq!(ChunkCoord::new(-1, 0).id(), 2);
    }

    #[test]
    fn test_pairing_injective_on_grid() {
        let mut seen = HashSet::new();
        for x in -150..=150 {
            for y in -150..=150 {
                assert!(seen.insert(ChunkCoord::new(x, y).id()), "collision at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_pairing_inverse_at_practical_extremes() {
        let samples = [-10_000, -9_999, -1, 0, 1, 4_096, 9_999, 10_000];
        for &x in &samples {
            for &y in &samples {
                let coord = ChunkCoord::new(x, y);
                assert_eq!(ChunkCoord::from_id(coord.id()), coord);
            }
        }
        for x in (-10_000..=10_000).step_by(97) {
            for y in (-10_000..=10_000).step_by(89) {
                let coord = ChunkCoord::new(x, y);
                assert_eq!(ChunkCoord::from_id(coord.id()), coord);
            }
        }
    }

    #[test]
    fn test_containing_floors_negative() {
        assert_eq!(ChunkCoord::containing(0, 0), (ChunkCoord::new(0, 0), 0, 0));
        assert_eq!(ChunkCoord::containing(-1, 17), (ChunkCoord::new(-1, 1), 15, 1));
        assert_eq!(ChunkCoord::containing(-16, -17), (ChunkCoord::new(-1, -2), 0, 15));
    }

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Unknown < Stage::BiomeAssigned);
        assert!(Stage::Generated < Stage::Populated);
        assert!(Stage::Lit < Stage::MeshReady);
    }

    #[test]
    fn test_rng_is_deterministic_per_chunk() {
        let mut a = ChunkRng::new(1018, 7);
        let mut b = ChunkRng::new(1018, 7);
        let mut c = ChunkRng::new(1018, 8);
        let xs: Vec<f64> = (0..8).map(|_| a.next()).collect();
        let ys: Vec<f64> = (0..8).map(|_| b.next()).collect();
        let zs: Vec<f64> = (0..8).map(|_| c.next()).collect();
        assert_eq!(xs, ys);
        assert_ne!(xs, zs);
        assert!(xs.iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_ungenerated_chunk_reads_air() {
        let chunk = Chunk::new(ChunkCoord::new(3, -2));
        assert!(!chunk.is_generated());
        assert_eq!(chunk.at(1, 2, 3), AIR);
        assert_eq!(chunk.light(1, 2, 3), 0);
        assert_eq!(chunk.height(1, 2), 0);
        assert_eq!(chunk.id, ChunkCoord::new(3, -2).id());
    }
}
