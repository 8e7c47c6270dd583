//! Meshing worker: turns padded chunk snapshots into meshes off the main context
//!
//! Requests queue by distance to a focus chunk and run as blocking jobs on
//! a `JoinSet`, at most `max_concurrent` at a time. Each job gets its own
//! [`GreedyMesher`], so jobs share nothing.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};

use log::{error, info, warn};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::core::config::MeshingConfig;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::meshing::buffer::ChunkMesh;
use crate::meshing::greedy::GreedyMesher;
use crate::streaming::priority::{ChunkPriority, ChunkPriorityQueue};
use crate::streaming::protocol::{MeshEvent, MeshRequest};
use crate::voxel::chunk::ChunkCoord;
use crate::voxel::padded::PaddedChunk;

/// Concurrent mesher with a proximity-ordered backlog
pub struct MeshingWorker {
    /// Channel for sending requests to the worker task
    request_tx: mpsc::UnboundedSender<MeshRequest>,
    /// Channel for receiving finished meshes
    result_rx: mpsc::UnboundedReceiver<MeshEvent>,
    /// Chunks with a job queued or running
    pending: HashSet<ChunkCoord>,
    /// Dedicated runtime, if the worker did not spawn on the caller's
    runtime: Option<Runtime>,
}

impl MeshingWorker {
    /// Start a worker on its own runtime
    pub fn new(config: &MeshingConfig) -> Result<Self> {
        let runtime = Runtime::new()?;
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        runtime.spawn(Self::worker_loop(config.clone(), request_rx, result_tx));

        Ok(Self {
            request_tx,
            result_rx,
            pending: HashSet::new(),
            runtime: Some(runtime),
        })
    }

    /// Start a worker on the current tokio runtime
    ///
    /// Panics if called outside a tokio runtime context.
    pub fn new_with_current_runtime(config: &MeshingConfig) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::worker_loop(config.clone(), request_rx, result_tx));

        Self {
            request_tx,
            result_rx,
            pending: HashSet::new(),
            runtime: None,
        }
    }

    async fn worker_loop(
        config: MeshingConfig,
        mut request_rx: mpsc::UnboundedReceiver<MeshRequest>,
        result_tx: mpsc::UnboundedSender<MeshEvent>,
    ) {
        info!("Meshing worker started ({} concurrent jobs)", config.max_concurrent);
        let mut active_tasks: JoinSet<(ChunkCoord, Result<ChunkMesh>)> = JoinSet::new();
        let mut queue = ChunkPriorityQueue::unbounded();
        let mut jobs: HashMap<ChunkCoord, (PaddedChunk, u8)> = HashMap::new();
        let mut focus = ChunkCoord::new(0, 0);
        let mut closed = false;

        loop {
            tokio::select! {
                request = request_rx.recv(), if !closed => match request {
                    Some(MeshRequest::Tesselate { chunk, quality }) => {
                        let coord = chunk.coord;
                        // a newer snapshot replaces a queued one
                        if jobs.insert(coord, (chunk, quality)).is_none() {
                            queue.push(ChunkPriority::calculate(coord, focus));
                        }
                    }
                    Some(MeshRequest::Focus { x, y }) => {
                        focus = ChunkCoord::new(x, y);
                        queue.refocus(focus);
                    }
                    None => closed = true,
                },

                Some(joined) = active_tasks.join_next(), if !active_tasks.is_empty() => {
                    let event = match joined {
                        Ok((_, Ok(mesh))) => Some(MeshEvent::Tesselated { mesh }),
                        Ok((coord, Err(e))) => {
                            warn!("Meshing chunk ({}, {}) failed: {}", coord.x, coord.y, e);
                            Some(MeshEvent::Failed { x: coord.x, y: coord.y, message: e.to_string() })
                        }
                        // panics are caught inside the job; only cancellation lands here
                        Err(e) => {
                            error!("Meshing task failed to join: {}", e);
                            None
                        }
                    };
                    if let Some(event) = event {
                        if result_tx.send(event).is_err() {
                            break;
                        }
                    }
                }

                else => break,
            }

            // Start new jobs while there is capacity
            while active_tasks.len() < config.max_concurrent {
                let Some(next) = queue.pop() else {
                    break;
                };
                let Some((chunk, quality)) = jobs.remove(&next.coord) else {
                    continue;
                };
                let ceiling = config.vertex_ceiling;
                active_tasks.spawn_blocking(move || {
                    let coord = chunk.coord;
                    let mesh = panic::catch_unwind(AssertUnwindSafe(|| {
                        GreedyMesher::new(quality).with_ceiling(ceiling).tesselate(&chunk)
                    }))
                    .unwrap_or_else(|payload| Err(Error::Streaming(panic_message(payload.as_ref()))));
                    (coord, mesh)
                });
            }

            if closed && jobs.is_empty() && active_tasks.is_empty() {
                break;
            }
        }
        info!("Meshing worker stopped");
    }

    /// Queue a chunk for meshing
    ///
    /// Returns `Ok(false)` if the chunk already has a job in flight.
    pub fn request(&mut self, chunk: PaddedChunk, quality: u8) -> Result<bool> {
        let coord = chunk.coord;
        if self.pending.contains(&coord) {
            return Ok(false);
        }
        self.send(MeshRequest::Tesselate { chunk, quality })?;
        self.pending.insert(coord);
        Ok(true)
    }

    /// Order queued jobs by distance to `coord`
    pub fn focus(&self, coord: ChunkCoord) -> Result<()> {
        self.send(MeshRequest::Focus { x: coord.x, y: coord.y })
    }

    fn send(&self, request: MeshRequest) -> Result<()> {
        self.request_tx
            .send(request)
            .map_err(|_| Error::Streaming("meshing worker has stopped".into()))
    }

    /// Poll for finished meshes (non-blocking)
    pub fn poll_results(&mut self) -> Vec<MeshEvent> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            self.pending.remove(&result.coord());
            results.push(result);
        }
        results
    }

    /// Get the number of chunks with a job queued or running
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a specific chunk has a job queued or running
    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.pending.contains(&coord)
    }
}

/// Readable text for a caught panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".into());
    format!("meshing panicked: {}", detail)
}

impl Drop for MeshingWorker {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::block::STONE;
    use std::time::Duration;

    fn config(max_concurrent: usize) -> MeshingConfig {
        MeshingConfig { max_concurrent, ..MeshingConfig::default() }
    }

    fn slab(coord: ChunkCoord) -> PaddedChunk {
        let mut padded = PaddedChunk::empty(coord);
        padded.lights.fill(15);
        for x in 0..16 {
            for y in 0..16 {
                for z in 0..4 {
                    padded.set(x, y, z, STONE);
                }
            }
        }
        padded
    }

    async fn collect(worker: &mut MeshingWorker, count: usize) -> Vec<MeshEvent> {
        let mut events = Vec::new();
        for _ in 0..500 {
            events.extend(worker.poll_results());
            if events.len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        events
    }

    #[tokio::test]
    async fn test_meshes_requested_chunks() {
        let mut worker = MeshingWorker::new_with_current_runtime(&config(2));
        for x in 0..4 {
            assert!(worker.request(slab(ChunkCoord::new(x, 0)), 1).unwrap());
        }
        assert_eq!(worker.pending_count(), 4);

        let events = collect(&mut worker, 4).await;
        assert_eq!(events.len(), 4);
        for event in &events {
            match event {
                MeshEvent::Tesselated { mesh } => assert_eq!(mesh.opaque.vertex_count(), 24),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(worker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_request_rejected_while_pending() {
        let mut worker = MeshingWorker::new_with_current_runtime(&config(1));
        let coord = ChunkCoord::new(3, 3);
        assert!(worker.request(slab(coord), 1).unwrap());
        assert!(!worker.request(slab(coord), 1).unwrap());
        assert!(worker.is_pending(coord));

        let events = collect(&mut worker, 1).await;
        assert_eq!(events.len(), 1);
        assert!(!worker.is_pending(coord));
        assert!(worker.request(slab(coord), 1).unwrap());
    }

    #[tokio::test]
    async fn test_invalid_block_reports_failure() {
        let mut worker = MeshingWorker::new_with_current_runtime(&config(1));
        let coord = ChunkCoord::new(-2, 5);
        let mut padded = slab(coord);
        padded.set(4, 4, 10, 200);
        worker.request(padded, 2).unwrap();

        let events = collect(&mut worker, 1).await;
        assert!(matches!(&events[0], MeshEvent::Failed { x: -2, y: 5, .. }));
    }

    #[tokio::test]
    async fn test_panicking_job_reports_failure_and_backlog_drains() {
        let mut worker = MeshingWorker::new_with_current_runtime(&config(1));
        let broken = PaddedChunk {
            voxels: Vec::new(),
            lights: Vec::new(),
            heights: Vec::new(),
            ..PaddedChunk::empty(ChunkCoord::new(0, 0))
        };
        worker.request(broken, 1).unwrap();
        worker.request(slab(ChunkCoord::new(1, 0)), 1).unwrap();
        worker.request(slab(ChunkCoord::new(2, 0)), 1).unwrap();

        let events = collect(&mut worker, 3).await;
        assert_eq!(events.len(), 3);
        let failed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                MeshEvent::Failed { x, y, message } => Some((ChunkCoord::new(*x, *y), message.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, ChunkCoord::new(0, 0));
        assert!(failed[0].1.contains("panicked"));
        assert_eq!(worker.pending_count(), 0);

        // the chunk can be queued again
        assert!(worker.request(slab(ChunkCoord::new(0, 0)), 1).unwrap());
    }

    #[test]
    fn test_dedicated_runtime_worker() {
        let mut worker = MeshingWorker::new(&config(4)).unwrap();
        worker.focus(ChunkCoord::new(0, 0)).unwrap();
        worker.request(slab(ChunkCoord::new(1, 1)), 0).unwrap();

        let mut events = Vec::new();
        for _ in 0..500 {
            events.extend(worker.poll_results());
            if !events.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].coord(), ChunkCoord::new(1, 1));
    }
}
