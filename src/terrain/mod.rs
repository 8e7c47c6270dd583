//! Procedural terrain generation

pub mod biome;
pub mod generator;
pub mod simplex;
pub mod structures;

pub use biome::Biome;
pub use generator::{TerrainGenerator, TerrainParams};
pub use structures::Structure;
