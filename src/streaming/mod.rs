//! Chunk streaming: worker tasks, message protocol and the consumer registry

pub mod budget;
pub mod generation_worker;
pub mod meshing_worker;
pub mod priority;
pub mod protocol;
pub mod registry;

pub use budget::WorkBudget;
pub use generation_worker::{GenerationHost, GenerationWorker};
pub use meshing_worker::MeshingWorker;
pub use priority::{ChunkPriority, ChunkPriorityQueue};
pub use protocol::{ChunkSnapshot, GenerationEvent, GenerationRequest, MeshEvent, MeshRequest, VoxelSample};
pub use registry::{ChunkRegistry, ChunkView, StepOutput};
