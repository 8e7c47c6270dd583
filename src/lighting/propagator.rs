//! Sky light seeding and worklist relaxation
//!
//! Light is stored per voxel as a level in 0..=15. Columns are lit from the
//! sky down to their height; light then spreads sideways and downwards,
//! losing one level per step, one more when it turns, plus the light loss of
//! the block it enters. Light arriving from neighbor chunks is pushed in at
//! the four horizontal borders.

use glam::IVec3;
use log::{debug, error};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::terrain::generator::TerrainGenerator;
use crate::voxel::block;
use crate::voxel::chunk::{index2d, index3d, Chunk, ChunkCoord, Stage, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, MAX_LIGHT};
use crate::voxel::face::Face;
use crate::voxel::map::ChunkMap;

/// Worklist length past which propagation is considered broken.
pub const WORKLIST_LIMIT: usize = 1_000_000;

/// Light level seeded below overhangs next to taller columns.
const OVERHANG_LIGHT: i32 = 13;

/// Pending light at a chunk-local position (x and y may lie one step outside
/// the chunk for border entries), travelling in `direction`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightNode {
    pub pos: IVec3,
    pub level: i32,
    pub direction: Face,
}

impl LightNode {
    fn new(x: i32, y: i32, z: i32, level: i32, direction: Face) -> Self {
        Self { pos: IVec3::new(x, y, z), level, direction }
    }
}

/// Lights chunks in a [`ChunkMap`].
#[derive(Clone, Debug)]
pub struct LightPropagator {
    limit: usize,
}

impl Default for LightPropagator {
    fn default() -> Self {
        Self { limit: WORKLIST_LIMIT }
    }
}

impl LightPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Propagator with a custom worklist bound.
    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }

    /// Populate a chunk and give it plain sky light. No-op once lights exist.
    pub fn seed(&self, terrain: &TerrainGenerator, map: &mut ChunkMap, coord: ChunkCoord) -> Result<()> {
        if map.get(coord).is_some_and(|c| c.lights.is_some()) {
            return Ok(());
        }
        terrain.populate(map, coord)?;
        seed_sky(map.chunk_at(coord));
        Ok(())
    }

    /// Light a chunk: seed its 3x3 ring, then relax sky and border light into it.
    ///
    /// Returns false when the chunk was already lit.
    pub fn light_chunk(&self, terrain: &TerrainGenerator, map: &mut ChunkMap, coord: ChunkCoord) -> Result<bool> {
        if map.get(coord).is_some_and(|c| c.stage >= Stage::Lit) {
            return Ok(false);
        }
        for c in ChunkMap::ring(coord, 9)? {
            self.seed(terrain, map, c)?;
        }

        let steps = self.relax(map, coord)?;
        map.chunk_at(coord).stage = Stage::Lit;
        debug!("Lit chunk ({}, {}) in {} steps", coord.x, coord.y, steps);
        Ok(true)
    }

    /// Recompute a generated chunk's light from scratch, e.g. after an edit.
    ///
    /// Neighbor chunks are read as they are; missing or unlit neighbors contribute nothing.
    pub fn relight(&self, map: &mut ChunkMap, coord: ChunkCoord) -> Result<usize> {
        match map.get_mut(coord) {
            Some(chunk) if chunk.is_generated() => {
                chunk.lights = None;
                seed_sky(chunk);
            }
            _ => return Ok(0),
        }
        self.relax(map, coord)
    }

    /// Build the worklist for a sky-seeded chunk and propagate it.
    fn relax(&self, map: &mut ChunkMap, coord: ChunkCoord) -> Result<usize> {
        let mut worklist = Vec::new();
        if let Some(chunk) = map.get(coord) {
            worklist = sky_nodes(chunk);
            border_nodes(map, chunk, &mut worklist);
        }
        let Some(chunk) = map.get_mut(coord) else {
            return Ok(0);
        };
        self.propagate(chunk, worklist).inspect_err(|e| {
            error!("Light propagation failed in chunk ({}, {}): {}", coord.x, coord.y, e);
        })
    }

    /// Relax a worklist into the chunk's light buffer, last entry first.
    ///
    /// Returns the number of entries processed.
    pub fn propagate(&self, chunk: &mut Chunk, mut worklist: Vec<LightNode>) -> Result<usize> {
        if chunk.lights.is_none() {
            seed_sky(chunk);
        }
        let (Some(voxels), Some(lights)) = (chunk.voxels.as_ref(), chunk.lights.as_mut()) else {
            return Ok(0);
        };

        let (w, h, d) = (CHUNK_WIDTH as i32, CHUNK_HEIGHT as i32, CHUNK_DEPTH as i32);
        let mut count = 0;

        while let Some(node) = worklist.pop() {
            count += 1;
            let IVec3 { x, y, z } = node.pos;
            let in_x = (0..w).contains(&x);
            let in_y = (0..h).contains(&y);

            let mut targets: [Option<(IVec3, Face)>; 6] = [None; 6];
            if z < d {
                if x > 0 && in_y {
                    targets[0] = Some((IVec3::new(x - 1, y, z), Face::West));
                }
                if x < w - 1 && in_y {
                    targets[1] = Some((IVec3::new(x + 1, y, z), Face::East));
                }
                if y > 0 && in_x {
                    targets[2] = Some((IVec3::new(x, y - 1, z), Face::North));
                }
                if y < h - 1 && in_x {
                    targets[3] = Some((IVec3::new(x, y + 1, z), Face::South));
                }
                if z < d - 1 && in_x && in_y {
                    targets[4] = Some((IVec3::new(x, y, z + 1), Face::Up));
                }
            }
            if z > 0 && in_x && in_y {
                targets[5] = Some((IVec3::new(x, y, z - 1), Face::Down));
            }

            for (target, direction) in targets.into_iter().flatten() {
                let index = index3d(target.x as usize, target.y as usize, target.z as usize);
                let loss = block::lookup(voxels[index])?.light_loss as i32;
                let turn = if direction == node.direction { 0 } else { 1 };
                let level = node.level - 1 - (loss + turn);

                if (lights[index] as i32) < level {
                    lights[index] = level as u8;
                    if level > 0 {
                        worklist.push(LightNode { pos: target, level, direction });
                    }
                }
            }

            if worklist.len() > self.limit {
                return Err(Error::LightWorklistOverflow(worklist.len()));
            }
        }
        Ok(count)
    }
}

/// Fill a chunk's light buffer with full light above every column and darkness below.
pub fn seed_sky(chunk: &mut Chunk) {
    let mut lights = vec![0u8; CHUNK_WIDTH * CHUNK_HEIGHT * CHUNK_DEPTH];
    for x in 0..CHUNK_WIDTH {
        for y in 0..CHUNK_HEIGHT {
            let top = chunk.height(x, y) as usize;
            for z in top + 1..CHUNK_DEPTH {
                lights[index3d(x, y, z)] = MAX_LIGHT;
            }
        }
    }
    chunk.lights = Some(lights);
}

/// Sky light entering each column, plus a dimmer band under taller neighbors.
fn sky_nodes(chunk: &Chunk) -> Vec<LightNode> {
    let Some(heights) = chunk.heights.as_ref() else {
        return Vec::new();
    };
    let (w, h) = (CHUNK_WIDTH, CHUNK_HEIGHT);
    let mut nodes = Vec::with_capacity(w * h);

    for x in 0..w {
        for y in 0..h {
            let here = heights[index2d(x, y)] as i32;
            nodes.push(LightNode::new(x as i32, y as i32, here + 1, MAX_LIGHT as i32, Face::Down));

            let west = if x > 0 { heights[index2d(x - 1, y)] as i32 } else { here };
            let north = if y > 0 { heights[index2d(x, y - 1)] as i32 } else { here };
            let east = if x < w - 1 { heights[index2d(x + 1, y)] as i32 } else { here };
            let south = if y < h - 1 { heights[index2d(x, y + 1)] as i32 } else { here };
            let highest = west.max(north).max(east).max(south);

            for z in (here + 2..=highest).rev() {
                nodes.push(LightNode::new(x as i32, y as i32, z, OVERHANG_LIGHT, Face::Down));
            }
        }
    }
    nodes
}

/// Light from lit neighbors that is brighter than the voxel across the border.
fn border_nodes(map: &ChunkMap, chunk: &Chunk, nodes: &mut Vec<LightNode>) {
    let Some(own) = chunk.lights.as_ref() else {
        return;
    };
    let lights_of = |dx, dy| map.get(chunk.coord.offset(dx, dy)).and_then(|c| c.lights.as_ref());
    let north = lights_of(0, -1);
    let east = lights_of(1, 0);
    let south = lights_of(0, 1);
    let west = lights_of(-1, 0);

    let (w, h) = (CHUNK_WIDTH, CHUNK_HEIGHT);
    for z in 0..CHUNK_DEPTH {
        let zi = z as i32;
        for x in 0..w {
            let xi = x as i32;
            if let Some(s) = south {
                let light = s[index3d(x, 0, z)];
                if light > own[index3d(x, h - 1, z)] {
                    nodes.push(LightNode::new(xi, h as i32, zi, light as i32, Face::North));
                }
            }
            if let Some(n) = north {
                let light = n[index3d(x, h - 1, z)];
                if light > own[index3d(x, 0, z)] {
                    nodes.push(LightNode::new(xi, -1, zi, light as i32, Face::South));
                }
            }
        }
        for y in 0..h {
            let yi = y as i32;
            if let Some(e) = east {
                let light = e[index3d(0, y, z)];
                if light > own[index3d(w - 1, y, z)] {
                    nodes.push(LightNode::new(w as i32, yi, zi, light as i32, Face::West));
                }
            }
            if let Some(wl) = west {
                let light = wl[index3d(w - 1, y, z)];
                if light > own[index3d(0, y, z)] {
                    nodes.push(LightNode::new(-1, yi, zi, light as i32, Face::East));
                }
            }
        }
    }
}
