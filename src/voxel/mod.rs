//! Voxel data structures and operations

pub mod block;
pub mod chunk;
pub mod face;
pub mod map;
pub mod padded;

pub use block::{BlockId, BlockSet, BlockType, CullMask};
pub use chunk::{Chunk, ChunkCoord, ChunkRng, Stage, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, MAX_LIGHT};
pub use face::Face;
pub use map::{ChunkMap, Flood, Sphere, VoxelSample};
pub use padded::PaddedChunk;
