//! Cubeworld - a paged voxel world engine

pub mod core;
pub mod math;
pub mod voxel;
pub mod terrain;
pub mod lighting;
pub mod meshing;
pub mod streaming;
