//! Consumer-side chunk registry
//!
//! Mirrors the chunks the generation worker has sent, decides which of them
//! are hot, visible and complete enough to show, admits mesh jobs for shown
//! chunks within a per-tick budget, and evicts chunks that leave the
//! interest area. It never edits voxels itself: edits are turned into
//! requests for the generation worker.

use std::collections::HashMap;

use glam::{IVec3, Vec3};
use log::{debug, warn};

use crate::core::config::StreamingConfig;
use crate::core::types::Result;
use crate::math::aabb::Aabb;
use crate::meshing::buffer::ChunkMesh;
use crate::streaming::budget::WorkBudget;
use crate::streaming::priority::{ChunkPriority, ChunkPriorityQueue};
use crate::streaming::protocol::{ChunkSnapshot, GenerationRequest, VoxelSample};
use crate::voxel::block::BlockId;
use crate::voxel::chunk::ChunkCoord;
use crate::voxel::map::{spiral_coords, ChunkMap};
use crate::voxel::padded::PaddedChunk;

/// Consumer-side state of one chunk.
#[derive(Clone, Debug, Default)]
pub struct ChunkView {
    /// Inside the interest spiral (or bordering a visible chunk).
    pub hot: bool,
    /// Within render distance of the player.
    pub visible: bool,
    /// Visible, with data, and all eight neighbors have data.
    pub shown: bool,
    /// The generation worker sent data for this chunk.
    pub was_sent: bool,
    pub mesh: Option<ChunkMesh>,
}

/// Work produced by one registry step.
#[derive(Debug, Default)]
pub struct StepOutput {
    pub generation: Vec<GenerationRequest>,
    /// Mesh jobs admitted this tick, nearest first.
    pub meshing: Vec<(PaddedChunk, u8)>,
}

/// The consumer's view of the world.
pub struct ChunkRegistry {
    map: ChunkMap,
    views: HashMap<ChunkCoord, ChunkView>,
    config: StreamingConfig,
    quality: u8,
    center: Option<ChunkCoord>,
    render_distance: f32,
}

impl ChunkRegistry {
    pub fn new(config: StreamingConfig, quality: u8) -> Self {
        let render_distance = config.render_distance;
        Self {
            map: ChunkMap::new(),
            views: HashMap::new(),
            config,
            quality,
            center: None,
            render_distance,
        }
    }

    pub fn map(&self) -> &ChunkMap {
        &self.map
    }

    pub fn view(&self, coord: ChunkCoord) -> Option<&ChunkView> {
        self.views.get(&coord)
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Change the shading tier; every chunk needs a new mesh.
    pub fn set_quality(&mut self, quality: u8) {
        if quality == self.quality {
            return;
        }
        self.quality = quality;
        for chunk in self.map.chunks_mut() {
            chunk.mesh_dirty = true;
        }
    }

    pub fn set_render_distance(&mut self, distance: f32) {
        self.render_distance = distance;
    }

    /// Store a chunk from the generation worker.
    ///
    /// Chunks outside the hot area are dropped and reported back as unloaded.
    /// Malformed snapshots are rejected with an error.
    pub fn accept_chunk(&mut self, snapshot: ChunkSnapshot) -> Result<Option<GenerationRequest>> {
        let coord = snapshot.coord;
        let hot = self.views.get(&coord).is_some_and(|v| v.hot);
        if self.center.is_some() && !hot {
            warn!("Discarding chunk ({}, {}) outside the hot area", coord.x, coord.y);
            return Ok(Some(GenerationRequest::Unloaded { x: coord.x, y: coord.y }));
        }
        snapshot.install(&mut self.map)?;
        self.views.entry(coord).or_default().was_sent = true;
        Ok(None)
    }

    /// Store a finished mesh. Returns false if the chunk is no longer hot.
    pub fn accept_mesh(&mut self, mesh: ChunkMesh) -> bool {
        let coord = mesh.coord;
        if let Some(chunk) = self.map.get_mut(coord) {
            chunk.mesh_pending = false;
        }
        match self.views.get_mut(&coord) {
            Some(view) if view.hot => {
                view.mesh = Some(mesh);
                true
            }
            _ => {
                warn!("Discarding stale mesh for chunk ({}, {})", coord.x, coord.y);
                false
            }
        }
    }

    /// Release a chunk whose mesh job failed, so a later edit can retry it.
    pub fn mesh_failed(&mut self, coord: ChunkCoord) {
        if let Some(chunk) = self.map.get_mut(coord) {
            chunk.mesh_pending = false;
        }
    }

    /// Forward an edit to the generation worker.
    pub fn edit(&self, x: i32, y: i32, z: i32, block: BlockId) -> GenerationRequest {
        GenerationRequest::SetVoxel { x, y, z, block }
    }

    pub fn hitscan(&self, origin: Vec3, direction: Vec3) -> Result<Option<IVec3>> {
        self.map.hitscan(origin, direction)
    }

    pub fn query(&self, bbox: &Aabb) -> Vec<VoxelSample> {
        self.map.query_box(bbox)
    }

    /// Meshes of every shown chunk.
    pub fn visible_meshes(&self) -> impl Iterator<Item = &ChunkMesh> {
        self.views.values().filter(|v| v.shown).filter_map(|v| v.mesh.as_ref())
    }

    /// Advance one tick with the player in `player`.
    pub fn step(&mut self, player: ChunkCoord) -> Result<StepOutput> {
        let mut out = StepOutput::default();

        if self.center != Some(player) || self.render_distance != self.config.render_distance {
            self.recenter(player);
            out.generation.push(GenerationRequest::ChunkOfInterest { x: player.x, y: player.y });
        }

        self.update_visibility()?;
        out.meshing = self.admit_mesh_jobs(player);
        out.generation.extend(self.evict_cold());
        Ok(out)
    }

    fn recenter(&mut self, player: ChunkCoord) {
        debug!("Player moved to chunk ({}, {})", player.x, player.y);
        self.center = Some(player);
        self.config.render_distance = self.render_distance;

        for view in self.views.values_mut() {
            view.hot = false;
            view.visible = false;
        }
        for coord in spiral_coords(player, self.config.interest_diameter) {
            let view = self.views.entry(coord).or_default();
            view.hot = true;
            view.visible = coord.distance(player) <= self.render_distance;
        }
    }

    fn has_data(&self, coord: ChunkCoord) -> bool {
        self.map.get(coord).is_some_and(|c| c.is_generated())
    }

    fn update_visibility(&mut self) -> Result<()> {
        let candidates: Vec<ChunkCoord> = self
            .views
            .iter()
            .filter(|(_, v)| v.hot && v.visible)
            .map(|(c, _)| *c)
            .collect();

        let mut shown = Vec::new();
        for coord in &candidates {
            if !self.has_data(*coord) {
                continue;
            }
            let ring = ChunkMap::ring(*coord, 8)?;
            let ready = ring.iter().filter(|c| self.has_data(**c)).count();
            for neighbor in ring {
                self.views.entry(neighbor).or_default().hot = true;
            }
            if ready == 8 {
                shown.push(*coord);
            }
        }

        for view in self.views.values_mut() {
            view.shown = false;
        }
        for coord in shown {
            if let Some(view) = self.views.get_mut(&coord) {
                view.shown = true;
            }
        }

        // hidden chunks give up their meshes and need a fresh one when shown again
        for (coord, view) in self.views.iter_mut() {
            if !(view.hot && view.visible) && view.mesh.take().is_some() {
                if let Some(chunk) = self.map.get_mut(*coord) {
                    chunk.mesh_dirty = true;
                }
            }
        }
        Ok(())
    }

    fn admit_mesh_jobs(&mut self, player: ChunkCoord) -> Vec<(PaddedChunk, u8)> {
        let mut queue = ChunkPriorityQueue::unbounded();
        for (coord, view) in &self.views {
            let dirty = self.map.get(*coord).is_some_and(|c| c.mesh_dirty && !c.mesh_pending);
            if view.shown && dirty {
                queue.push(ChunkPriority::calculate(*coord, player));
            }
        }

        let mut budget = WorkBudget::new(self.config.mesh_jobs_per_tick);
        let mut jobs = Vec::new();
        while let Some(next) = queue.pop() {
            if !budget.try_spend(1) {
                break;
            }
            let padded = self.map.padded(next.coord);
            if let Some(chunk) = self.map.get_mut(next.coord) {
                chunk.mesh_pending = true;
                chunk.mesh_dirty = false;
            }
            jobs.push((padded, self.quality));
        }
        jobs
    }

    fn evict_cold(&mut self) -> Vec<GenerationRequest> {
        let cold: Vec<ChunkCoord> = self.views.iter().filter(|(_, v)| !v.hot).map(|(c, _)| *c).collect();
        let mut requests = Vec::new();
        for coord in cold {
            if let Some(view) = self.views.remove(&coord) {
                if view.was_sent {
                    requests.push(GenerationRequest::Unloaded { x: coord.x, y: coord.y });
                }
            }
            self.map.evict(coord);
        }
        if !requests.is_empty() {
            debug!("Evicted {} chunks", requests.len());
        }
        requests
    }
}
