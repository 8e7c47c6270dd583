//! Priority queue for chunk work based on distance to a focus chunk

use crate::voxel::chunk::ChunkCoord;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Priority information for a chunk
#[derive(Clone, Copy, Debug)]
pub struct ChunkPriority {
    pub coord: ChunkCoord,
    pub priority: f32,  // Higher = more important
    pub distance: f32,  // Distance from the focus, in chunks
}

impl ChunkPriority {
    /// Calculate priority for a chunk from its distance to `focus`
    pub fn calculate(coord: ChunkCoord, focus: ChunkCoord) -> Self {
        let distance = coord.distance(focus);
        Self {
            coord,
            priority: 1.0 / (distance + 1.0),
            distance,
        }
    }
}

// Implement Ord/PartialOrd for BinaryHeap (max-heap by default)
impl Eq for ChunkPriority {}

impl PartialEq for ChunkPriority {
    fn eq(&self, other: &Self) -> bool {
        self.coord == other.coord
    }
}

impl Ord for ChunkPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Use total_cmp for f32 to handle NaN/infinity properly;
        // ties go to the lower coordinate so pops are deterministic
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for ChunkPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap of chunks, nearest to the focus first
pub struct ChunkPriorityQueue {
    heap: BinaryHeap<ChunkPriority>,
    max_distance: f32,  // Don't queue chunks beyond this
}

impl ChunkPriorityQueue {
    /// Create a new priority queue with a maximum distance
    pub fn new(max_distance: f32) -> Self {
        Self {
            heap: BinaryHeap::new(),
            max_distance,
        }
    }

    /// Queue without a distance limit
    pub fn unbounded() -> Self {
        Self::new(f32::INFINITY)
    }

    /// Add a chunk to the queue. Returns false if it lies beyond the maximum distance.
    pub fn push(&mut self, priority: ChunkPriority) -> bool {
        if priority.distance <= self.max_distance {
            self.heap.push(priority);
            true
        } else {
            false
        }
    }

    /// Get the highest priority chunk
    pub fn pop(&mut self) -> Option<ChunkPriority> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Recompute every queued priority against a new focus
    pub fn refocus(&mut self, focus: ChunkCoord) {
        let queued = std::mem::take(&mut self.heap);
        for entry in queued {
            self.push(ChunkPriority::calculate(entry.coord, focus));
        }
    }
}
