//! Surface extraction: packed vertex buffers from padded chunk snapshots

pub mod buffer;
pub mod faces;
pub mod greedy;

pub use buffer::{ChunkMesh, MeshBuffer, MeshTarget, Vertex, VERTEX_CEILING};
pub use greedy::{GreedyMesher, Quad};
