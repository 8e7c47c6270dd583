//! Messages exchanged between the consumer and the two workers
//!
//! Every message is tagged with an `event` field when serialized, so the
//! same types can travel over any transport.

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::meshing::buffer::ChunkMesh;
use crate::terrain::biome::Biome;
use crate::voxel::block::BlockId;
use crate::voxel::chunk::{Chunk, ChunkCoord, CHUNK_AREA, CHUNK_VOLUME};
use crate::voxel::map::ChunkMap;
use crate::voxel::padded::PaddedChunk;

pub use crate::voxel::map::VoxelSample;

/// A fully lit chunk as handed to the consumer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkSnapshot {
    pub coord: ChunkCoord,
    pub voxels: Vec<BlockId>,
    pub lights: Vec<u8>,
    pub heights: Vec<u8>,
    pub biome: Biome,
}

impl ChunkSnapshot {
    /// Copy a chunk's buffers; `None` until it is generated, lit and has a biome.
    pub fn from_chunk(chunk: &Chunk) -> Option<Self> {
        Some(Self {
            coord: chunk.coord,
            voxels: chunk.voxels.clone()?,
            lights: chunk.lights.clone()?,
            heights: chunk.heights.clone()?,
            biome: chunk.biome?,
        })
    }

    /// Store the snapshot in a map, replacing whatever the chunk held.
    ///
    /// Snapshots with wrongly sized buffers are rejected and leave the map untouched.
    pub fn install(self, map: &mut ChunkMap) -> Result<()> {
        let sizes = (self.voxels.len(), self.lights.len(), self.heights.len());
        if sizes != (CHUNK_VOLUME, CHUNK_VOLUME, CHUNK_AREA) {
            return Err(Error::Streaming(format!(
                "malformed snapshot for chunk ({}, {}): buffer sizes {:?}",
                self.coord.x, self.coord.y, sizes
            )));
        }
        map.chunk_at(self.coord).install(self.voxels, self.lights, self.heights, self.biome);
        Ok(())
    }
}

/// Requests handled by the generation worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GenerationRequest {
    /// Generate and light one chunk now, outside the per-tick budget.
    Generate { x: i32, y: i32 },
    /// Move the center of the area kept generated.
    ChunkOfInterest { x: i32, y: i32 },
    /// The consumer dropped a chunk; it may be sent again later.
    Unloaded { x: i32, y: i32 },
    /// Edit one voxel in world space.
    SetVoxel { x: i32, y: i32, z: i32, block: BlockId },
    QueryVoxels { min: IVec3, max: IVec3 },
    Hitscan { origin: Vec3, direction: Vec3 },
}

/// Results produced by the generation worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GenerationEvent {
    NewChunk { chunk: ChunkSnapshot },
    /// The chunks around the origin are ready.
    Spawn,
    Voxels { samples: Vec<VoxelSample> },
    Hit { cell: Option<IVec3> },
    /// The worker hit an unrecoverable error and stopped.
    Failed { message: String },
}

/// Requests handled by the meshing worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MeshRequest {
    Tesselate { chunk: PaddedChunk, quality: u8 },
    /// Chunk that queued jobs are ordered by distance to.
    Focus { x: i32, y: i32 },
}

/// Results produced by the meshing worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MeshEvent {
    Tesselated { mesh: ChunkMesh },
    Failed { x: i32, y: i32, message: String },
}

impl MeshEvent {
    pub fn coord(&self) -> ChunkCoord {
        match self {
            MeshEvent::Tesselated { mesh } => mesh.coord,
            MeshEvent::Failed { x, y, .. } => ChunkCoord::new(*x, *y),
        }
    }
}
