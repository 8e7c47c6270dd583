//! Read-only chunk snapshot with a one-voxel halo
//!
//! Coordinates are chunk-local; the halo is addressed with -1 and
//! `CHUNK_WIDTH` / `CHUNK_HEIGHT` / `CHUNK_DEPTH`.

use serde::{Deserialize, Serialize};

use crate::core::types::Result;
use crate::voxel::block::{self, BlockId};
use crate::voxel::chunk::{ChunkCoord, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, MAX_LIGHT};

pub const PADDED_WIDTH: usize = CHUNK_WIDTH + 2;
pub const PADDED_HEIGHT: usize = CHUNK_HEIGHT + 2;
pub const PADDED_DEPTH: usize = CHUNK_DEPTH + 2;
pub const PADDED_VOLUME: usize = PADDED_WIDTH * PADDED_HEIGHT * PADDED_DEPTH;

/// Buffer index of a (possibly halo) voxel.
#[inline]
pub fn padded_index3d(x: i32, y: i32, z: i32) -> usize {
    (z + 1) as usize + PADDED_DEPTH * ((y + 1) as usize + PADDED_WIDTH * (x + 1) as usize)
}

/// Buffer index of a (possibly halo) column.
#[inline]
pub fn padded_index2d(x: i32, y: i32) -> usize {
    (x + 1) as usize + PADDED_HEIGHT * (y + 1) as usize
}

/// Snapshot of one chunk plus the ring of voxels around it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaddedChunk {
    pub coord: ChunkCoord,
    pub voxels: Vec<BlockId>,
    pub lights: Vec<u8>,
    pub heights: Vec<u8>,
}

impl PaddedChunk {
    /// All-air, unlit snapshot.
    pub fn empty(coord: ChunkCoord) -> Self {
        Self {
            coord,
            voxels: vec![0; PADDED_VOLUME],
            lights: vec![0; PADDED_VOLUME],
            heights: vec![0; PADDED_WIDTH * PADDED_HEIGHT],
        }
    }

    #[inline]
    pub fn at(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.voxels[padded_index3d(x, y, z)]
    }

    /// Stored light plus the illumination bonus of the block occupying the cell.
    pub fn light(&self, x: i32, y: i32, z: i32) -> Result<u8> {
        let index = padded_index3d(x, y, z);
        let here = block::lookup(self.voxels[index])?;
        Ok(self.lights[index].min(MAX_LIGHT) + here.illumination)
    }

    pub fn height(&self, x: i32, y: i32) -> u8 {
        self.heights[padded_index2d(x, y)]
    }

    /// Write a voxel and keep the column height current. Used to build test fixtures.
    pub fn set(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
        self.voxels[padded_index3d(x, y, z)] = id;
        if id != block::AIR && (0..CHUNK_DEPTH as i32).contains(&z) {
            let h = &mut self.heights[padded_index2d(x, y)];
            *h = (*h).max(z as u8);
        }
    }

    pub fn set_light(&mut self, x: i32, y: i32, z: i32, level: u8) {
        self.lights[padded_index3d(x, y, z)] = level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_index_layout() {
        assert_eq!(padded_index3d(-1, -1, -1), 0);
        assert_eq!(padded_index3d(0, 0, 0), 1 + PADDED_DEPTH * (1 + PADDED_WIDTH));
        assert_eq!(
            padded_index3d(CHUNK_WIDTH as i32, CHUNK_HEIGHT as i32, CHUNK_DEPTH as i32),
            PADDED_VOLUME - 1
        );
        assert_eq!(padded_index2d(-1, -1), 0);
        assert_eq!(padded_index2d(16, 16), PADDED_WIDTH * PADDED_HEIGHT - 1);
    }

    #[test]
    fn test_light_adds_illumination() {
        let mut padded = PaddedChunk::empty(ChunkCoord::new(0, 0));
        padded.set_light(0, 0, 5, 10);
        padded.set(1, 0, 5, block::STONE);
        padded.set_light(1, 0, 5, 10);

        assert_eq!(padded.light(0, 0, 5).unwrap(), 11);
        assert_eq!(padded.light(1, 0, 5).unwrap(), 10);
    }

    #[test]
    fn test_out_of_range_light_is_clamped() {
        let mut padded = PaddedChunk::empty(ChunkCoord::new(0, 0));
        padded.set_light(2, 2, 2, u8::MAX);
        assert_eq!(padded.light(2, 2, 2).unwrap(), MAX_LIGHT + 1);
    }

    #[test]
    fn test_set_tracks_height() {
        let mut padded = PaddedChunk::empty(ChunkCoord::new(0, 0));
        padded.set(3, 4, 20, block::DIRT);
        padded.set(3, 4, 7, block::DIRT);
        assert_eq!(padded.height(3, 4), 20);
    }
}
