//! Error types for the cubeworld engine

use thiserror::Error;

use crate::meshing::buffer::MeshTarget;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    /// Voxel buffer holds an id outside the block catalog
    #[error("invalid block id: {0}")]
    InvalidBlockId(u8),

    /// Raycast requested with a zero-length direction
    #[error("raycast in zero direction")]
    DegenerateDirection,

    /// A mesh buffer grew past the vertex ceiling and was emptied
    #[error("{target:?} mesh overflow: {vertices} vertices exceeds ceiling of {ceiling}")]
    MeshOverflow {
        target: MeshTarget,
        vertices: usize,
        ceiling: usize,
    },

    /// Light propagation worklist grew past its safety bound
    #[error("light worklist exceeded {0} entries")]
    LightWorklistOverflow(usize),

    #[error("unsupported neighbor ring size: {0}")]
    InvalidRing(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Streaming error: {0}")]
    Streaming(String),
}
