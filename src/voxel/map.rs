//! Sparse registry of chunks keyed by pairing id
//!
//! All methods take world-space coordinates. Reads never create chunks;
//! `chunk_at`, `neighbors`, `spiral` and `within` create missing chunks on demand.

use std::collections::{HashMap, HashSet};

use glam::{DVec2, DVec3, IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::aabb::Aabb;
use crate::math::raycast::raycast;
use crate::terrain::biome::Biome;
use crate::voxel::block::{AIR, BlockId, BlockSet};
use crate::voxel::chunk::{
    index2d, index3d, Chunk, ChunkCoord, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, MAX_LIGHT,
};
use crate::voxel::padded::{padded_index2d, padded_index3d, PaddedChunk};

/// Maximum distance covered by [`ChunkMap::hitscan`].
pub const HITSCAN_RANGE: f64 = 1000.0;

/// A world position resolved to its chunk and chunk-local column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub coord: ChunkCoord,
    pub x: usize,
    pub y: usize,
    pub z: i32,
}

/// One voxel returned by a region query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelSample {
    pub position: IVec3,
    pub block: BlockId,
    pub light: u8,
}

/// Flood fill decision for a visited cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flood {
    /// Keep spreading to the six face neighbors.
    Spread,
    /// Do not spread from this cell.
    Skip,
    /// Stop the whole fill.
    Halt,
}

/// End cap of a tapered tube.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: DVec3,
    pub radius: f64,
}

impl Sphere {
    pub fn new(x: f64, y: f64, z: f64, radius: f64) -> Self {
        Self { center: DVec3::new(x, y, z), radius }
    }
}

/// Owner of every chunk in a world.
#[derive(Debug, Default)]
pub struct ChunkMap {
    chunks: HashMap<u64, Chunk>,
}

impl ChunkMap {
    pub fn new() -> Self {
        Self { chunks: HashMap::new() }
    }

    // --- Registry ---

    /// Get the chunk at a coordinate, creating it if needed.
    pub fn chunk_at(&mut self, coord: ChunkCoord) -> &mut Chunk {
        self.chunks.entry(coord.id()).or_insert_with(|| Chunk::new(coord))
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord.id())
    }

    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord.id())
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord.id())
    }

    /// Remove a chunk and its buffers. A later reference starts it from scratch.
    pub fn evict(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        self.chunks.remove(&coord.id())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn chunks_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.values_mut()
    }

    pub fn coords(&self) -> Vec<ChunkCoord> {
        self.chunks.values().map(|c| c.coord).collect()
    }

    /// Number of chunks per assigned biome.
    pub fn biome_census(&self) -> HashMap<Biome, usize> {
        let mut census = HashMap::new();
        for biome in self.chunks.values().filter_map(|c| c.biome) {
            *census.entry(biome).or_insert(0) += 1;
        }
        census
    }

    // --- Voxel access ---

    /// Resolve a world position to its chunk and local column.
    pub fn locate(x: i32, y: i32, z: i32) -> Location {
        let (coord, lx, ly) = ChunkCoord::containing(x, y);
        Location { coord, x: lx, y: ly, z }
    }

    /// Block at a world position; Air outside [0, depth) or in ungenerated chunks.
    pub fn voxel_at(&self, x: i32, y: i32, z: i32) -> BlockId {
        if !(0..CHUNK_DEPTH as i32).contains(&z) {
            return AIR;
        }
        let loc = Self::locate(x, y, z);
        self.get(loc.coord).map_or(AIR, |c| c.at(loc.x, loc.y, z as usize))
    }

    /// Light at a world position; 0 below the world, full light above it.
    pub fn light_at(&self, x: i32, y: i32, z: i32) -> u8 {
        if z < 0 {
            return 0;
        }
        if z >= CHUNK_DEPTH as i32 {
            return MAX_LIGHT;
        }
        let loc = Self::locate(x, y, z);
        self.get(loc.coord).map_or(0, |c| c.light(loc.x, loc.y, z as usize))
    }

    /// Cached height of a world column.
    pub fn height_at(&self, x: i32, y: i32) -> u8 {
        let loc = Self::locate(x, y, 0);
        self.get(loc.coord).map_or(0, |c| c.height(loc.x, loc.y))
    }

    /// Write a voxel, keeping the column height current.
    ///
    /// Returns whether anything changed. Out-of-world z and ungenerated chunks are no-ops.
    pub fn set_voxel(&mut self, x: i32, y: i32, z: i32, id: BlockId) -> bool {
        if !(0..CHUNK_DEPTH as i32).contains(&z) {
            return false;
        }
        let loc = Self::locate(x, y, z);
        let Some(chunk) = self.chunks.get_mut(&loc.coord.id()) else {
            return false;
        };
        let (Some(voxels), Some(heights)) = (chunk.voxels.as_mut(), chunk.heights.as_mut()) else {
            return false;
        };

        let z = z as usize;
        let index = index3d(loc.x, loc.y, z);
        if voxels[index] == id {
            return false;
        }
        voxels[index] = id;
        chunk.mesh_dirty = true;

        let column = index2d(loc.x, loc.y);
        let current = heights[column] as usize;
        if id == AIR {
            if current == z {
                let mut h = z;
                while h > 0 && voxels[index3d(loc.x, loc.y, h)] == AIR {
                    h -= 1;
                }
                heights[column] = h as u8;
            }
        } else if z > current {
            heights[column] = z as u8;
        }
        true
    }

    /// Write only into Air. Returns whether the write happened.
    pub fn set_if(&mut self, x: i32, y: i32, z: i32, id: BlockId) -> bool {
        if self.voxel_at(x, y, z) != AIR {
            return false;
        }
        self.set_voxel(x, y, z, id)
    }

    /// Write only over blocks in `allowed`. Returns whether the write happened.
    pub fn set_iff(&mut self, x: i32, y: i32, z: i32, id: BlockId, allowed: &BlockSet) -> bool {
        if !allowed.contains(self.voxel_at(x, y, z)) {
            return false;
        }
        self.set_voxel(x, y, z, id)
    }

    /// All voxels in an inclusive cell range, skipping ungenerated chunks and out-of-world z.
    pub fn query_region(&self, min: IVec3, max: IVec3) -> Vec<VoxelSample> {
        let mut found = Vec::new();
        for i in min.x..=max.x {
            for j in min.y..=max.y {
                let loc = Self::locate(i, j, 0);
                let Some(chunk) = self.get(loc.coord).filter(|c| c.is_generated()) else {
                    continue;
                };
                for k in min.z.max(0)..=max.z.min(CHUNK_DEPTH as i32 - 1) {
                    let z = k as usize;
                    found.push(VoxelSample {
                        position: IVec3::new(i, j, k),
                        block: chunk.at(loc.x, loc.y, z),
                        light: chunk.light(loc.x, loc.y, z),
                    });
                }
            }
        }
        found
    }

    /// Voxels overlapping a world-space box (floor of min to ceil of max).
    pub fn query_box(&self, bbox: &Aabb) -> Vec<VoxelSample> {
        let (min, max) = bbox.cell_range();
        self.query_region(min, max)
    }

    // --- Chunk neighborhoods ---

    /// Coordinates of a neighbor ring, x-major.
    ///
    /// Sizes: 1 (self), 8 / 9 (radius 1 without / with self),
    /// 24 / 25 (radius 2 without / with self), 49 (radius 3 with self).
    pub fn ring(coord: ChunkCoord, size: usize) -> Result<Vec<ChunkCoord>> {
        let (radius, with_self) = match size {
            1 => return Ok(vec![coord]),
            8 => (1, false),
            9 => (1, true),
            24 => (2, false),
            25 => (2, true),
            49 => (3, true),
            other => return Err(Error::InvalidRing(other)),
        };

        let mut coords = Vec::with_capacity(size);
        for i in -radius..=radius {
            for j in -radius..=radius {
                if i == 0 && j == 0 && !with_self {
                    continue;
                }
                coords.push(coord.offset(i, j));
            }
        }
        Ok(coords)
    }

    /// Visit every chunk of a neighbor ring, creating missing ones.
    pub fn neighbors<F>(&mut self, coord: ChunkCoord, size: usize, mut visit: F) -> Result<()>
    where
        F: FnMut(&mut Chunk),
    {
        for c in Self::ring(coord, size)? {
            visit(self.chunk_at(c));
        }
        Ok(())
    }

    /// Square spiral outward from (cx, cy), creating missing chunks.
    pub fn spiral(&mut self, cx: i32, cy: i32, diameter: i32) -> Vec<ChunkCoord> {
        let coords = spiral_coords(ChunkCoord::new(cx, cy), diameter);
        for &c in &coords {
            self.chunk_at(c);
        }
        coords
    }

    /// Chunks of the 7x7 ring around `point` whose jittered center is within `distance`,
    /// farthest first.
    pub fn within(&mut self, point: DVec2, distance: f64) -> Vec<ChunkCoord> {
        let (origin, _, _) = ChunkCoord::containing(point.x.floor() as i32, point.y.floor() as i32);
        let mut found: Vec<(ChunkCoord, f64)> = Vec::new();
        for c in Self::ring(origin, 49).unwrap_or_default() {
            let d = self.chunk_at(c).center.distance(point);
            if d <= distance {
                found.push((c, d));
            }
        }
        found.sort_by(|a, b| b.1.total_cmp(&a.1));
        found.into_iter().map(|(c, _)| c).collect()
    }

    // --- Snapshots ---

    /// Copy a chunk and a one-voxel halo from its neighbors.
    pub fn padded(&self, coord: ChunkCoord) -> PaddedChunk {
        let mut pc = PaddedChunk::empty(coord);
        let origin = coord.world_origin();
        let own = self.get(coord).filter(|c| c.is_generated());

        for i in -1..=CHUNK_WIDTH as i32 {
            for j in -1..=CHUNK_HEIGHT as i32 {
                let interior = (0..CHUNK_WIDTH as i32).contains(&i) && (0..CHUNK_HEIGHT as i32).contains(&j);
                if let (true, Some(chunk)) = (interior, own) {
                    let (x, y) = (i as usize, j as usize);
                    let src = index3d(x, y, 0);
                    let dst = padded_index3d(i, j, 0);
                    if let (Some(voxels), Some(lights)) = (&chunk.voxels, &chunk.lights) {
                        pc.voxels[dst..dst + CHUNK_DEPTH].copy_from_slice(&voxels[src..src + CHUNK_DEPTH]);
                        pc.lights[dst..dst + CHUNK_DEPTH].copy_from_slice(&lights[src..src + CHUNK_DEPTH]);
                    } else if let Some(voxels) = &chunk.voxels {
                        pc.voxels[dst..dst + CHUNK_DEPTH].copy_from_slice(&voxels[src..src + CHUNK_DEPTH]);
                    }
                    pc.lights[padded_index3d(i, j, -1)] = 0;
                    pc.lights[padded_index3d(i, j, CHUNK_DEPTH as i32)] = MAX_LIGHT;
                    pc.heights[padded_index2d(i, j)] = chunk.height(x, y);
                    continue;
                }

                let (wx, wy) = (origin.x + i, origin.y + j);
                for k in -1..=CHUNK_DEPTH as i32 {
                    let dst = padded_index3d(i, j, k);
                    pc.voxels[dst] = self.voxel_at(wx, wy, k);
                    pc.lights[dst] = self.light_at(wx, wy, k);
                }
                pc.heights[padded_index2d(i, j)] = self.height_at(wx, wy);
            }
        }
        pc
    }

    // --- Traversal and carving ---

    /// First non-air voxel along a ray, within [`HITSCAN_RANGE`].
    pub fn hitscan(&self, origin: Vec3, direction: Vec3) -> Result<Option<IVec3>> {
        raycast(origin.as_dvec3(), direction.as_dvec3(), HITSCAN_RANGE, |cell, _| {
            self.voxel_at(cell.x, cell.y, cell.z) != AIR
        })
    }

    /// Cells pierced by the segment from `origin` to `destination`, nearest first.
    pub fn line(origin: DVec3, destination: DVec3) -> Result<Vec<IVec3>> {
        let delta = destination - origin;
        let length = delta.length();
        if length == 0.0 {
            return Ok(vec![origin.floor().as_ivec3()]);
        }
        let mut cells = Vec::new();
        raycast(origin, delta / length, length, |cell, _| {
            cells.push(cell);
            false
        })?;
        Ok(cells)
    }

    /// 6-connected fill from `start`, driven by `visit`. Each cell is visited at most once.
    pub fn flood_fill<F>(&mut self, start: IVec3, mut visit: F)
    where
        F: FnMut(&mut ChunkMap, IVec3) -> Flood,
    {
        let mut visited = HashSet::new();
        self.flood_with(start, &mut visited, &mut visit);
    }

    fn flood_with<F>(&mut self, start: IVec3, visited: &mut HashSet<IVec3>, visit: &mut F) -> bool
    where
        F: FnMut(&mut ChunkMap, IVec3) -> Flood,
    {
        let mut stack = vec![start];
        while let Some(cell) = stack.pop() {
            if !visited.insert(cell) {
                continue;
            }
            match visit(self, cell) {
                Flood::Halt => return false,
                Flood::Skip => {}
                Flood::Spread => {
                    for offset in NEIGHBOR_OFFSETS {
                        let next = cell + offset;
                        if !visited.contains(&next) {
                            stack.push(next);
                        }
                    }
                }
            }
        }
        true
    }

    /// Paint a tube tapering from `a` to `b`, clamping to the segment ends (rounded caps).
    ///
    /// `paint` maps (cell, current block) to the new block; returning the current block
    /// leaves the cell alone and stops the fill there.
    pub fn rasterize_segment<F>(&mut self, a: Sphere, b: Sphere, paint: F) -> Result<()>
    where
        F: Fn(IVec3, BlockId) -> BlockId,
    {
        self.rasterize(a, b, true, paint)
    }

    /// Like [`ChunkMap::rasterize_segment`] but with flat ends.
    pub fn rasterize_cylinder<F>(&mut self, a: Sphere, b: Sphere, paint: F) -> Result<()>
    where
        F: Fn(IVec3, BlockId) -> BlockId,
    {
        self.rasterize(a, b, false, paint)
    }

    fn rasterize<F>(&mut self, a: Sphere, b: Sphere, clamp: bool, paint: F) -> Result<()>
    where
        F: Fn(IVec3, BlockId) -> BlockId,
    {
        let axis = b.center - a.center;
        let length_sq = axis.length_squared();
        let mut visit = |map: &mut ChunkMap, cell: IVec3| {
            let current = map.voxel_at(cell.x, cell.y, cell.z);
            let replacement = paint(cell, current);
            if replacement == current {
                return Flood::Skip;
            }
            map.set_voxel(cell.x, cell.y, cell.z, replacement);

            let pos = cell.as_dvec3() + DVec3::splat(0.5);
            let mut t = if length_sq > 0.0 { (pos - a.center).dot(axis) / length_sq } else { 0.0 };
            if clamp {
                t = t.clamp(0.0, 1.0);
            } else if !(0.0..=1.0).contains(&t) {
                return Flood::Skip;
            }
            let radius = a.radius + (b.radius - a.radius) * t;
            if pos.distance(a.center + axis * t) < radius { Flood::Spread } else { Flood::Skip }
        };

        let mut visited = HashSet::new();
        for cell in Self::line(a.center, b.center)? {
            if !self.flood_with(cell, &mut visited, &mut visit) {
                break;
            }
        }
        Ok(())
    }
}

const NEIGHBOR_OFFSETS: [IVec3; 6] = [
    IVec3::new(-1, 0, 0),
    IVec3::new(1, 0, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, 0, -1),
    IVec3::new(0, 0, 1),
];

/// Square spiral of `diameter`² chunks around `center`, nearest rings first.
pub fn spiral_coords(center: ChunkCoord, diameter: i32) -> Vec<ChunkCoord> {
    let mut list = Vec::new();
    let (mut x, mut y) = (0i32, 0i32);
    let (mut dx, mut dy) = (0i32, -1i32);

    for _ in 0..diameter * diameter {
        if -diameter < 2 * x && 2 * x <= diameter && -diameter < 2 * y && 2 * y <= diameter {
            list.push(center.offset(x, y));
        }
        if x == y || (x < 0 && x == -y) || (x > 0 && x == 1 - y) {
            (dx, dy) = (-dy, dx);
        }
        x += dx;
        y += dy;
    }
    list
}
