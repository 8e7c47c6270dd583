//! Generation worker: terrain, structures and light for chunks near the hot chunk
//!
//! The worker owns its own [`ChunkMap`]. Every tick it walks a spiral around
//! the hot chunk and sends up to a budgeted number of chunks it has not sent
//! yet, each fully lit. Requests from the consumer move the hot chunk,
//! release chunks for re-sending, apply edits and answer queries.

use std::collections::HashSet;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::core::config::{EngineConfig, GenerationConfig};
use crate::core::error::Error;
use crate::core::types::Result;
use crate::lighting::propagator::LightPropagator;
use crate::streaming::budget::WorkBudget;
use crate::streaming::protocol::{ChunkSnapshot, GenerationEvent, GenerationRequest};
use crate::terrain::generator::TerrainGenerator;
use crate::voxel::block::{self, BlockId};
use crate::voxel::chunk::{ChunkCoord, CHUNK_HEIGHT, CHUNK_WIDTH};
use crate::voxel::map::{spiral_coords, ChunkMap};

/// Side length of the spiral sent before the first tick.
const SPAWN_DIAMETER: i32 = 3;

/// Synchronous state of the generation worker.
pub struct GenerationHost {
    map: ChunkMap,
    terrain: TerrainGenerator,
    lights: LightPropagator,
    config: GenerationConfig,
    hot: ChunkCoord,
    sent: HashSet<ChunkCoord>,
}

impl GenerationHost {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            map: ChunkMap::new(),
            terrain: TerrainGenerator::new(config.terrain.clone()),
            lights: LightPropagator::new(),
            config: config.generation.clone(),
            hot: ChunkCoord::new(0, 0),
            sent: HashSet::new(),
        }
    }

    pub fn map(&self) -> &ChunkMap {
        &self.map
    }

    pub fn hot(&self) -> ChunkCoord {
        self.hot
    }

    pub fn is_sent(&self, coord: ChunkCoord) -> bool {
        self.sent.contains(&coord)
    }

    /// Send the chunks around the origin, then announce the spawn.
    pub fn start(&mut self) -> Result<Vec<GenerationEvent>> {
        let mut events = Vec::new();
        for coord in spiral_coords(ChunkCoord::new(0, 0), SPAWN_DIAMETER) {
            events.extend(self.send_chunk(coord)?);
        }
        events.push(GenerationEvent::Spawn);
        info!("Generation worker sent {} spawn chunks", events.len() - 1);
        Ok(events)
    }

    /// Send the nearest unsent chunks around the hot chunk, within the tick budget.
    pub fn tick(&mut self) -> Result<Vec<GenerationEvent>> {
        let mut budget = WorkBudget::new(self.config.chunks_per_tick as u32);
        let mut events = Vec::new();

        for coord in spiral_coords(self.hot, self.config.hot_diameter) {
            if budget.is_exhausted() {
                break;
            }
            if self.sent.contains(&coord) {
                continue;
            }
            budget.try_spend(1);
            events.extend(self.send_chunk(coord)?);
        }
        Ok(events)
    }

    pub fn handle(&mut self, request: GenerationRequest) -> Result<Vec<GenerationEvent>> {
        match request {
            GenerationRequest::Generate { x, y } => self.send_chunk(ChunkCoord::new(x, y)).map(Vec::from_iter),
            GenerationRequest::ChunkOfInterest { x, y } => {
                self.hot = ChunkCoord::new(x, y);
                debug!("Hot chunk is now ({}, {})", x, y);
                Ok(Vec::new())
            }
            GenerationRequest::Unloaded { x, y } => {
                self.sent.remove(&ChunkCoord::new(x, y));
                Ok(Vec::new())
            }
            GenerationRequest::SetVoxel { x, y, z, block } => self.edit(x, y, z, block),
            GenerationRequest::QueryVoxels { min, max } => Ok(vec![GenerationEvent::Voxels {
                samples: self.map.query_region(min, max),
            }]),
            GenerationRequest::Hitscan { origin, direction } => Ok(vec![GenerationEvent::Hit {
                cell: self.map.hitscan(origin, direction)?,
            }]),
        }
    }

    /// Light a chunk and snapshot it, marking it sent.
    fn send_chunk(&mut self, coord: ChunkCoord) -> Result<Option<GenerationEvent>> {
        self.lights.light_chunk(&self.terrain, &mut self.map, coord)?;
        let snapshot = self.map.get(coord).and_then(ChunkSnapshot::from_chunk);
        if snapshot.is_some() {
            self.sent.insert(coord);
        }
        Ok(snapshot.map(|chunk| GenerationEvent::NewChunk { chunk }))
    }

    /// Apply an edit, relight the touched chunks and re-send those the consumer holds.
    ///
    /// Ids outside the block catalog are rejected before anything is written.
    fn edit(&mut self, x: i32, y: i32, z: i32, block: BlockId) -> Result<Vec<GenerationEvent>> {
        if let Err(e) = block::lookup(block) {
            warn!("Rejecting edit at ({}, {}, {}): {}", x, y, z, e);
            return Ok(Vec::new());
        }
        if !self.map.set_voxel(x, y, z, block) {
            return Ok(Vec::new());
        }
        let loc = ChunkMap::locate(x, y, z);
        let border = |local: usize, size: usize| match local {
            0 => -1,
            l if l == size - 1 => 1,
            _ => 0,
        };
        let (dx, dy) = (border(loc.x, CHUNK_WIDTH), border(loc.y, CHUNK_HEIGHT));

        // edge neighbors first, so a diagonal chunk relights from fresh borders
        let mut touched = vec![loc.coord];
        if dx != 0 {
            touched.push(loc.coord.offset(dx, 0));
        }
        if dy != 0 {
            touched.push(loc.coord.offset(0, dy));
        }
        if dx != 0 && dy != 0 {
            touched.push(loc.coord.offset(dx, dy));
        }

        let mut events = Vec::new();
        for coord in touched {
            self.lights.relight(&mut self.map, coord)?;
            if self.sent.contains(&coord) {
                if let Some(chunk) = self.map.get(coord).and_then(ChunkSnapshot::from_chunk) {
                    events.push(GenerationEvent::NewChunk { chunk });
                }
            }
        }
        debug!("Edit at ({}, {}, {}) re-sent {} chunks", x, y, z, events.len());
        Ok(events)
    }
}

/// Handle to a generation worker running on tokio.
pub struct GenerationWorker {
    /// Channel for sending requests to the worker task
    request_tx: mpsc::UnboundedSender<GenerationRequest>,
    /// Channel for receiving worker events
    event_rx: mpsc::UnboundedReceiver<GenerationEvent>,
    /// Dedicated runtime, if the worker did not spawn on the caller's
    runtime: Option<Runtime>,
}

impl GenerationWorker {
    /// Start a worker on its own runtime
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let runtime = Runtime::new()?;
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let host = GenerationHost::new(config);
        let tick = Duration::from_millis(config.generation.tick_interval_ms.max(1));
        runtime.spawn(Self::worker_loop(host, tick, request_rx, event_tx));

        Ok(Self { request_tx, event_rx, runtime: Some(runtime) })
    }

    /// Start a worker on the current tokio runtime
    ///
    /// Panics if called outside a tokio runtime context.
    pub fn new_with_current_runtime(config: &EngineConfig) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let host = GenerationHost::new(config);
        let tick = Duration::from_millis(config.generation.tick_interval_ms.max(1));
        tokio::spawn(Self::worker_loop(host, tick, request_rx, event_tx));

        Self { request_tx, event_rx, runtime: None }
    }

    async fn worker_loop(
        mut host: GenerationHost,
        tick: Duration,
        mut request_rx: mpsc::UnboundedReceiver<GenerationRequest>,
        event_tx: mpsc::UnboundedSender<GenerationEvent>,
    ) {
        info!("Generation worker started");
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut outcome = host.start();
        loop {
            match outcome {
                Ok(events) => {
                    for event in events {
                        if event_tx.send(event).is_err() {
                            info!("Generation worker stopped: consumer gone");
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!("Generation worker failed: {}", e);
                    let _ = event_tx.send(GenerationEvent::Failed { message: e.to_string() });
                    return;
                }
            }

            outcome = tokio::select! {
                request = request_rx.recv() => match request {
                    Some(request) => host.handle(request),
                    None => break,
                },
                _ = interval.tick() => host.tick(),
            };
        }
        info!("Generation worker stopped");
    }

    /// Queue a request for the worker
    pub fn send(&self, request: GenerationRequest) -> Result<()> {
        self.request_tx
            .send(request)
            .map_err(|_| Error::Streaming("generation worker has stopped".into()))
    }

    /// Poll for worker events (non-blocking)
    pub fn poll_events(&mut self) -> Vec<GenerationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for GenerationWorker {
    fn drop(&mut self) {
        // Don't block the caller on a chunk that is mid-generation
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::block::{AIR, STONE};

    fn config(chunks_per_tick: usize, hot_diameter: i32) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.generation.chunks_per_tick = chunks_per_tick;
        config.generation.hot_diameter = hot_diameter;
        config.generation.tick_interval_ms = 1;
        config
    }

    fn sent_coords(events: &[GenerationEvent]) -> Vec<ChunkCoord> {
        events
            .iter()
            .filter_map(|e| match e {
                GenerationEvent::NewChunk { chunk } => Some(chunk.coord),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_start_sends_spawn_ring() {
        let mut host = GenerationHost::new(&config(5, 35));
        let events = host.start().unwrap();
        assert_eq!(sent_coords(&events).len(), 9);
        assert_eq!(events.last(), Some(&GenerationEvent::Spawn));
        assert!(host.is_sent(ChunkCoord::new(-1, 1)));
    }

    #[test]
    fn test_tick_respects_budget_and_skips_sent() {
        let mut host = GenerationHost::new(&config(2, 5));
        host.start().unwrap();

        let first = sent_coords(&host.tick().unwrap());
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|c| c.x.abs() == 2 || c.y.abs() == 2));

        let second = sent_coords(&host.tick().unwrap());
        assert_eq!(second.len(), 2);
        assert!(second.iter().all(|c| !first.contains(c)));
    }

    #[test]
    fn test_unloaded_chunk_is_resent() {
        let mut host = GenerationHost::new(&config(1, 1));
        host.start().unwrap();
        assert!(host.tick().unwrap().is_empty());

        host.handle(GenerationRequest::Unloaded { x: 0, y: 0 }).unwrap();
        assert!(!host.is_sent(ChunkCoord::new(0, 0)));
        assert_eq!(sent_coords(&host.tick().unwrap()), vec![ChunkCoord::new(0, 0)]);
    }

    #[test]
    fn test_chunk_of_interest_moves_spiral() {
        let mut host = GenerationHost::new(&config(1, 1));
        host.handle(GenerationRequest::ChunkOfInterest { x: 4, y: -2 }).unwrap();
        assert_eq!(host.hot(), ChunkCoord::new(4, -2));
        assert_eq!(sent_coords(&host.tick().unwrap()), vec![ChunkCoord::new(4, -2)]);
    }

    #[test]
    fn test_edit_relights_and_resends() {
        let mut host = GenerationHost::new(&config(1, 1));
        host.start().unwrap();

        // dig out the top of a column in the middle of the origin chunk
        let h = host.map().height_at(8, 8) as i32;
        let events = host
            .handle(GenerationRequest::SetVoxel { x: 8, y: 8, z: h, block: AIR })
            .unwrap();
        assert_eq!(sent_coords(&events), vec![ChunkCoord::new(0, 0)]);
        assert_eq!(host.map().light_at(8, 8, h), 15);

        // an edit on the border re-sends both chunks
        let events = host
            .handle(GenerationRequest::SetVoxel { x: 0, y: 8, z: 250, block: STONE })
            .unwrap();
        let coords = sent_coords(&events);
        assert!(coords.contains(&ChunkCoord::new(0, 0)));
        assert!(coords.contains(&ChunkCoord::new(-1, 0)));

        // a no-op edit sends nothing
        let events = host
            .handle(GenerationRequest::SetVoxel { x: 0, y: 8, z: 250, block: STONE })
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_corner_edit_resends_diagonal_neighbor() {
        let mut host = GenerationHost::new(&config(1, 1));
        host.start().unwrap();

        let events = host
            .handle(GenerationRequest::SetVoxel { x: 0, y: 0, z: 250, block: STONE })
            .unwrap();
        let coords = sent_coords(&events);
        assert_eq!(
            coords,
            vec![ChunkCoord::new(0, 0), ChunkCoord::new(-1, 0), ChunkCoord::new(0, -1), ChunkCoord::new(-1, -1)]
        );
    }

    #[test]
    fn test_unknown_block_edit_is_rejected() {
        let mut host = GenerationHost::new(&config(1, 1));
        host.start().unwrap();
        let before = host.map().voxel_at(3, 3, 200);
        let height = host.map().height_at(3, 3);

        let events = host
            .handle(GenerationRequest::SetVoxel { x: 3, y: 3, z: 200, block: 200 })
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(host.map().voxel_at(3, 3, 200), before);
        assert_eq!(host.map().height_at(3, 3), height);

        // the host keeps serving requests
        let events = host
            .handle(GenerationRequest::SetVoxel { x: 3, y: 3, z: 200, block: STONE })
            .unwrap();
        assert_eq!(sent_coords(&events), vec![ChunkCoord::new(0, 0)]);
        assert_eq!(host.map().voxel_at(3, 3, 200), STONE);
    }

    #[test]
    fn test_queries() {
        let mut host = GenerationHost::new(&config(1, 1));
        host.start().unwrap();

        let events = host
            .handle(GenerationRequest::Hitscan {
                origin: glam::Vec3::new(8.5, 8.5, 255.0),
                direction: glam::Vec3::NEG_Z,
            })
            .unwrap();
        let h = host.map().height_at(8, 8) as i32;
        assert_eq!(events, vec![GenerationEvent::Hit { cell: Some(glam::IVec3::new(8, 8, h)) }]);

        let events = host
            .handle(GenerationRequest::QueryVoxels {
                min: glam::IVec3::new(0, 0, 0),
                max: glam::IVec3::new(1, 1, 1),
            })
            .unwrap();
        match &events[0] {
            GenerationEvent::Voxels { samples } => assert_eq!(samples.len(), 8),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_worker_streams_chunks() {
        let mut worker = GenerationWorker::new_with_current_runtime(&config(2, 5));
        worker.send(GenerationRequest::ChunkOfInterest { x: 0, y: 0 }).unwrap();

        let mut events = Vec::new();
        for _ in 0..500 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            events.extend(worker.poll_events());
            if sent_coords(&events).len() >= 12 {
                break;
            }
        }
        assert!(events.contains(&GenerationEvent::Spawn));
        assert!(sent_coords(&events).len() >= 12);
    }

    #[test]
    fn test_dedicated_runtime_worker() {
        let mut worker = GenerationWorker::new(&config(1, 3)).unwrap();
        worker.send(GenerationRequest::Unloaded { x: 0, y: 0 }).unwrap();

        let mut events = Vec::new();
        for _ in 0..500 {
            std::thread::sleep(Duration::from_millis(10));
            events.extend(worker.poll_events());
            if events.contains(&GenerationEvent::Spawn) {
                break;
            }
        }
        assert!(events.contains(&GenerationEvent::Spawn));
    }
}
