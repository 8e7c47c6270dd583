//! Mathematical utilities and data structures

pub mod aabb;
pub mod raycast;

pub use aabb::Aabb;
pub use raycast::{raycast, RayStep, VoxelTraversal};
