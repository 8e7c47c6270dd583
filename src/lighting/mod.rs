//! Voxel light: sky seeding and flood propagation across chunk borders

pub mod propagator;

pub use propagator::{LightNode, LightPropagator, WORKLIST_LIMIT};
