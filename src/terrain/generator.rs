//! Noise-based procedural terrain generation
//!
//! Chunks move through four demand-driven stages. Each stage first brings the
//! neighbor ring it reads up to the previous stage:
//!
//! | stage        | reads                     |
//! |--------------|---------------------------|
//! | biome        | nothing                   |
//! | seed         | biomes of the 3x3 ring    |
//! | generate     | seeds of the 7x7 ring     |
//! | populate     | terrain of the 5x5 ring   |

use glam::{DVec2, DVec3, IVec3};
use log::debug;
use noise::NoiseFn;
use serde::{Deserialize, Serialize};

use super::biome::Biome;
use super::simplex::SeededSimplex;
use super::structures::{Structure, ORES};
use crate::core::types::Result;
use crate::voxel::block::{AIR, SNOW, WATER};
use crate::voxel::chunk::{
    index2d, index3d, CaveSeed, Chunk, ChunkCoord, ChunkRng, Stage, CHUNK_AREA, CHUNK_DEPTH, CHUNK_HEIGHT,
    CHUNK_VOLUME, CHUNK_WIDTH,
};
use crate::voxel::map::ChunkMap;

/// Parameters controlling terrain generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub seed: u32,
    /// Fraction of the world depth at the deepest ocean floor.
    pub sea_floor: f64,
    /// Fraction of the world depth filled with water.
    pub sea_level: f64,
    /// Fraction of the world depth at the nominal mountain top.
    pub terrain_cap: f64,
    /// Distance within which chunk centers are considered for blending.
    pub biome_smoothing: f64,
    /// Distance at which a chunk's blend weight reaches zero.
    pub blend_radius: f64,
    /// Cave radius range (min, max).
    pub caveness: [f64; 2],
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 1018,
            sea_floor: 0.3,
            sea_level: 0.4,
            terrain_cap: 0.7,
            biome_smoothing: 100.0,
            blend_radius: 23.0,
            caveness: [1.5, 4.0],
        }
    }
}

/// Procedural terrain generator
pub struct TerrainGenerator {
    params: TerrainParams,
    simplex: SeededSimplex,
    lower: f64,
    middle: f64,
    higher: f64,
}

impl TerrainGenerator {
    /// Create a new terrain generator with the given parameters
    pub fn new(params: TerrainParams) -> Self {
        let depth = CHUNK_DEPTH as f64;
        Self {
            simplex: SeededSimplex::new(params.seed),
            lower: depth * params.sea_floor,
            middle: depth * params.sea_level,
            higher: depth * params.terrain_cap,
            params,
        }
    }

    /// Get terrain parameters
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Absolute z of the sea floor, sea level and terrain cap.
    pub fn levels(&self) -> (f64, f64, f64) {
        (self.lower, self.middle, self.higher)
    }

    /// 2-D simplex noise rescaled to [-1, 1].
    pub fn noise2(&self, x: f64, y: f64) -> f64 {
        (self.simplex.get([x, y]) / 0.866).clamp(-1.0, 1.0)
    }

    /// Map a blended elevation in [-1, 1] to an absolute z.
    fn column_height(&self, elevation: f64) -> f64 {
        let span = if elevation < 0.0 { self.middle - self.lower } else { self.higher - self.middle };
        self.middle + elevation * span
    }

    /// Biome from roughness and moisture noise, before river overrides.
    pub fn classify(&self, coord: ChunkCoord) -> Biome {
        let (x, y) = (coord.x as f64, coord.y as f64);
        let roughness = (self.noise2(x / 10.0 + 0.5, y / 10.0) * 2.0 + self.noise2(x / 20.0 + 0.5, y / 20.0)) / 3.0;
        let moisture = (self.noise2(x / 8.0 + 0.5, y / 8.0) * 2.0 + self.noise2(x / 16.0 + 0.5, y / 16.0)) / 3.0;
        Biome::classify(roughness, moisture)
    }

    // --- Stages ---

    /// Stage 1: assign the noise biome to a chunk.
    pub fn assign_biome(&self, chunk: &mut Chunk) {
        if chunk.initial_biome.is_some() {
            return;
        }
        chunk.initial_biome = Some(self.classify(chunk.coord));
        chunk.stage = chunk.stage.max(Stage::BiomeAssigned);
    }

    /// Stage 2: start the chunk's random stream, apply river overrides and
    /// pick the jittered center, rough height and cave seeds.
    pub fn seed_chunk(&self, map: &mut ChunkMap, coord: ChunkCoord) -> Result<()> {
        if map.chunk_at(coord).stage >= Stage::Seeded {
            return Ok(());
        }
        map.neighbors(coord, 9, |c| self.assign_biome(c))?;

        let chunk = map.chunk_at(coord);
        let mut rng = ChunkRng::new(self.params.seed, chunk.id);
        let initial = chunk.initial_biome.unwrap_or_else(|| self.classify(coord));

        let threshold = initial.params().river;
        let (x, y) = (coord.x as f64, coord.y as f64);
        let rivers = 1.0 - (self.noise2(x / (30.0 / threshold) + 5.5, y / (30.0 / threshold)) * 2.0).abs();
        let biome = if rivers > threshold { Biome::River } else { initial };

        chunk.center = DVec2::new(
            (x + rng.next()) * CHUNK_WIDTH as f64,
            (y + rng.next()) * CHUNK_HEIGHT as f64,
        );
        chunk.rough_height = self.column_height(biome.params().height);

        let [min_radius, max_radius] = self.params.caveness;
        let cave_rng = rng.next();
        let radius = cave_rng * cave_rng * (max_radius - min_radius) + min_radius;
        chunk.cave_budget = (rng.next() * 40.0).floor() as i32 + 40;

        let origin = coord.world_origin();
        chunk.caves = (0..biome.params().caves)
            .map(|_| {
                let depth = rng.next();
                let cx = origin.x + rng.below(CHUNK_WIDTH) as i32;
                let cy = origin.y + rng.below(CHUNK_HEIGHT) as i32;
                let cz = (depth * (chunk.rough_height * 0.95) + 5.0).floor() as i32;
                CaveSeed { position: IVec3::new(cx, cy, cz), radius }
            })
            .collect();

        chunk.biome = Some(biome);
        chunk.rng = Some(rng);
        chunk.stage = Stage::Seeded;
        debug!("Seeded chunk ({}, {}) as {}", coord.x, coord.y, biome.name());
        Ok(())
    }

    /// Stage 3: fill voxel and height buffers and record deferred structures.
    pub fn generate(&self, map: &mut ChunkMap, coord: ChunkCoord) -> Result<()> {
        if map.chunk_at(coord).stage >= Stage::Generated {
            return Ok(());
        }
        for c in ChunkMap::ring(coord, 49)? {
            self.seed_chunk(map, c)?;
        }

        // Blend sources: every nearby chunk center and its biome.
        let nearest: Vec<(DVec2, Biome)> = map
            .within(coord.world_center(), self.params.biome_smoothing)
            .into_iter()
            .filter_map(|c| map.get(c).and_then(|ch| ch.biome.map(|b| (ch.center, b))))
            .collect();

        let chunk = map.chunk_at(coord);
        let own = chunk.biome.unwrap_or(Biome::Plains);
        let distinct = nearest.iter().any(|&(_, b)| b != own);
        let origin = coord.world_origin();

        let mut voxels = vec![AIR; CHUNK_VOLUME];
        let mut heights = vec![0u8; CHUNK_AREA];
        let mut total_height = 0.0;

        for x in 0..CHUNK_WIDTH {
            for y in 0..CHUNK_HEIGHT {
                let wx = (origin.x + x as i32) as f64;
                let wy = (origin.y + y as i32) as f64;

                let weights = if distinct {
                    self.blend_weights(&nearest, DVec2::new(wx, wy))
                } else {
                    None
                };
                let (samples, best) = weights.unwrap_or_else(|| {
                    let mut samples = [0.0; 6];
                    samples[own.index()] = 1.0;
                    (samples, own)
                });

                let mut elevation = 0.0;
                for biome in Biome::ALL {
                    let weight = samples[biome.index()];
                    if weight > 0.0 {
                        elevation += biome.elevation(|a, b| self.noise2(a, b), wx, wy) * weight;
                    }
                }

                let top = self.fill_column(&mut voxels, x, y, self.column_height(elevation), best, wx, wy);
                heights[index2d(x, y)] = top as u8;
                total_height += top as f64;
            }
        }

        let chunk = map.chunk_at(coord);
        chunk.average_height = total_height / CHUNK_AREA as f64;
        chunk.voxels = Some(voxels);
        chunk.heights = Some(heights);
        chunk.stage = Stage::Generated;

        self.scatter_structures(map, coord)?;
        debug!(
            "Generated chunk ({}, {}), average height {:.1}",
            coord.x,
            coord.y,
            map.chunk_at(coord).average_height
        );
        Ok(())
    }

    /// Stage 4: replay deferred structures, most recent first.
    pub fn populate(&self, map: &mut ChunkMap, coord: ChunkCoord) -> Result<()> {
        if map.chunk_at(coord).stage >= Stage::Populated {
            return Ok(());
        }
        for c in ChunkMap::ring(coord, 25)? {
            self.generate(map, c)?;
        }

        let chunk = map.chunk_at(coord);
        let mut structures = std::mem::take(&mut chunk.structures);
        let mut rng = chunk.rng.take().unwrap_or_else(|| ChunkRng::new(self.params.seed, chunk.id));
        let placed = structures.len();

        while let Some(structure) = structures.pop() {
            structure.apply(map, &mut rng)?;
        }

        map.chunk_at(coord).stage = Stage::Populated;
        debug!("Populated chunk ({}, {}) with {} structures", coord.x, coord.y, placed);
        Ok(())
    }

    /// Run every stage up to populated.
    pub fn prepare(&self, map: &mut ChunkMap, coord: ChunkCoord) -> Result<()> {
        self.populate(map, coord)
    }

    // --- Helpers ---

    /// Normalized blend weight per biome at a world column, and the dominant biome.
    ///
    /// Weight falls linearly from 1 at a chunk center to 0 at the blend radius.
    fn blend_weights(&self, nearest: &[(DVec2, Biome)], point: DVec2) -> Option<([f64; 6], Biome)> {
        let radius = self.params.blend_radius;
        let inv: Vec<f64> = nearest
            .iter()
            .map(|(center, _)| {
                let d = center.distance(point);
                if d > radius { 0.0 } else { 1.0 - d / radius }
            })
            .collect();
        let sum: f64 = inv.iter().sum();
        if sum <= 0.0 {
            return None;
        }

        let mut samples = [0.0; 6];
        let mut best = None;
        let mut best_sample = 0.0;
        let mut total = 0.0;
        for (&(_, biome), &w) in nearest.iter().zip(&inv) {
            if w == 0.0 {
                continue;
            }
            let w = w / sum;
            let sample = &mut samples[biome.index()];
            *sample += w;
            if *sample > best_sample {
                best_sample = *sample;
                best = Some(biome);
            }
            total += w;
        }

        for s in &mut samples {
            *s /= total;
        }
        best.map(|b| (samples, b))
    }

    /// Write one column and return its highest non-air z.
    #[allow(clippy::too_many_arguments)]
    fn fill_column(&self, voxels: &mut [u8], x: usize, y: usize, height: f64, biome: Biome, wx: f64, wy: f64) -> usize {
        let palette = biome.palette();
        let snow_line = self.higher - 30.0 + 10.0 * (self.noise2(wx / 15.0, wy / 15.0) * 0.5 + 0.5);
        let water_line = CHUNK_DEPTH as f64 * self.params.sea_level;
        let mut highest = 0;

        for z in 0..CHUNK_DEPTH {
            let zf = z as f64;
            let block = if zf >= height {
                if zf < water_line {
                    WATER
                } else {
                    break;
                }
            } else if zf > snow_line {
                SNOW
            } else if zf < height - 3.0 {
                palette.filler
            } else if zf < height - 1.0 {
                if zf < self.middle { palette.shore } else { palette.subsurface }
            } else if zf < self.middle {
                palette.shore
            } else {
                palette.surface
            };
            voxels[index3d(x, y, z)] = block;
            highest = z;
        }
        highest
    }

    /// Record surface decorations, ore veins and cave tunnels for a generated chunk.
    fn scatter_structures(&self, map: &mut ChunkMap, coord: ChunkCoord) -> Result<()> {
        let chunk = map.chunk_at(coord);
        let mut rng = chunk.rng.take().unwrap_or_else(|| ChunkRng::new(self.params.seed, chunk.id));
        let heights = chunk.heights.clone().unwrap_or_default();
        let origin = coord.world_origin();
        let mut taken = [false; CHUNK_AREA];
        let mut structures = Vec::new();

        let mut scatter = |rng: &mut ChunkRng, count: usize, lift: i32, make: fn(IVec3) -> Structure| {
            for _ in 0..count {
                let x = rng.below(CHUNK_WIDTH);
                let y = rng.below(CHUNK_HEIGHT);
                let column = index2d(x, y);
                if taken[column] {
                    continue;
                }
                taken[column] = true;
                let z = heights.get(column).copied().unwrap_or(0) as i32 + lift;
                structures.push(make(IVec3::new(origin.x + x as i32, origin.y + y as i32, z)));
            }
        };

        match chunk.biome {
            Some(Biome::Forest) => {
                scatter(&mut rng, 5, 1, Structure::Pine);
                scatter(&mut rng, 10, 1, Structure::Tuft);
                scatter(&mut rng, 5, 1, Structure::Plant);
            }
            Some(Biome::Plains) => {
                if rng.next() < 0.2 {
                    scatter(&mut rng, 5, 1, Structure::Plant);
                } else {
                    scatter(&mut rng, 12, 1, Structure::Tuft);
                }
                if rng.next() < 0.1 {
                    scatter(&mut rng, 1, 1, Structure::Tree);
                }
            }
            Some(Biome::Desert) => {
                scatter(&mut rng, 8, 1, Structure::Twig);
                if rng.next() < 0.01 {
                    scatter(&mut rng, 1, -1, Structure::Monolith);
                }
            }
            _ => {}
        }

        let average = chunk.average_height;
        let per_10k = average * CHUNK_AREA as f64 / 10_000.0;
        for (block, density, bias, radius) in ORES {
            let mut i = 0.0;
            while i < density * per_10k {
                let center = DVec3::new(
                    origin.x as f64 + CHUNK_WIDTH as f64 * rng.next(),
                    origin.y as f64 + CHUNK_HEIGHT as f64 * rng.next(),
                    average * rng.next().powi(bias),
                );
                structures.push(Structure::Vein { block, center, radius });
                i += 1.0;
            }
        }

        // Pair each own cave with every cave of the 8 surrounding chunks.
        let own_caves = chunk.caves.clone();
        let mut pairs = Vec::new();
        for from in own_caves {
            for c in ChunkMap::ring(coord, 8)? {
                let Some(neighbor) = map.get(c) else { continue };
                for &to in &neighbor.caves {
                    let offset = if to.position.z == from.position.z {
                        1
                    } else {
                        (to.position.z - from.position.z).abs()
                    };
                    let score = rng.next() + offset as f64 / 50.0;
                    pairs.push((score, offset, from, to));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let chunk = map.chunk_at(coord);
        let mut budget = chunk.cave_budget;
        let mut tunnels = 0;
        for (_, cost, from, to) in pairs {
            budget -= cost;
            if budget < 0 {
                break;
            }
            // pushed last so they are carved first
            structures.push(Structure::Cave { from, to });
            tunnels += 1;
        }

        debug!("Chunk ({}, {}): {} structures, {} tunnels", coord.x, coord.y, structures.len(), tunnels);
        chunk.cave_budget = budget;
        chunk.structures = structures;
        chunk.rng = Some(rng);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> TerrainGenerator {
        TerrainGenerator::new(TerrainParams::default())
    }

    #[test]
    fn test_noise_is_bounded() {
        let g = generator();
        for i in 0..200 {
            let v = g.noise2(i as f64 * 0.37, i as f64 * -0.11);
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_biome_stage_only_touches_ring() {
        let g = generator();
        let mut map = ChunkMap::new();
        g.seed_chunk(&mut map, ChunkCoord::new(0, 0)).unwrap();

        assert_eq!(map.len(), 9);
        let center = map.get(ChunkCoord::new(0, 0)).unwrap();
        assert_eq!(center.stage, Stage::Seeded);
        assert!(center.rng.is_some());
        assert!(!center.is_generated());
        let edge = map.get(ChunkCoord::new(1, 1)).unwrap();
        assert_eq!(edge.stage, Stage::BiomeAssigned);
        assert!(edge.biome.is_none());
    }

    #[test]
    fn test_seed_sets_cave_parameters() {
        let g = generator();
        let mut map = ChunkMap::new();
        let coord = ChunkCoord::new(3, -2);
        g.seed_chunk(&mut map, coord).unwrap();

        let chunk = map.get(coord).unwrap();
        assert!((40..80).contains(&chunk.cave_budget));
        let biome = chunk.biome.unwrap();
        assert_eq!(chunk.caves.len(), biome.params().caves);
        let origin = coord.world_origin();
        for cave in &chunk.caves {
            assert!((1.5..=4.0).contains(&cave.radius));
            assert!((origin.x..origin.x + 16).contains(&cave.position.x));
            assert!((origin.y..origin.y + 16).contains(&cave.position.y));
            assert!(cave.position.z >= 5);
        }
        // jittered center stays inside the footprint
        assert!(chunk.center.x >= origin.x as f64 && chunk.center.x < (origin.x + 16) as f64);
    }

    #[test]
    fn test_generate_seeds_seven_by_seven() {
        let g = generator();
        let mut map = ChunkMap::new();
        g.generate(&mut map, ChunkCoord::new(0, 0)).unwrap();

        for c in ChunkMap::ring(ChunkCoord::new(0, 0), 49).unwrap() {
            assert!(map.get(c).unwrap().stage >= Stage::Seeded, "{c:?}");
        }
        assert_eq!(map.get(ChunkCoord::new(0, 0)).unwrap().stage, Stage::Generated);
        assert!(!map.get(ChunkCoord::new(1, 0)).unwrap().is_generated());
    }

    #[test]
    fn test_generation_is_deterministic() {
        let g = generator();
        let coord = ChunkCoord::new(-2, 5);
        let mut a = ChunkMap::new();
        let mut b = ChunkMap::new();
        g.populate(&mut a, coord).unwrap();
        // different request order on the second map
        g.generate(&mut b, coord.offset(2, 2)).unwrap();
        g.populate(&mut b, coord).unwrap();

        let ca = a.get(coord).unwrap();
        let cb = b.get(coord).unwrap();
        assert_eq!(ca.biome, cb.biome);
        assert_eq!(ca.heights, cb.heights);
        assert_eq!(ca.voxels, cb.voxels);
    }

    #[test]
    fn test_heights_match_voxels_after_generation() {
        let g = generator();
        let mut map = ChunkMap::new();
        let coord = ChunkCoord::new(1, 1);
        g.populate(&mut map, coord).unwrap();

        let chunk = map.get(coord).unwrap();
        for x in 0..CHUNK_WIDTH {
            for y in 0..CHUNK_HEIGHT {
                let expected = (0..CHUNK_DEPTH).rev().find(|&z| chunk.at(x, y, z) != AIR).unwrap_or(0);
                assert_eq!(chunk.height(x, y) as usize, expected);
            }
        }
    }

    #[test]
    fn test_origin_chunk_is_land_within_band() {
        let g = generator();
        let (lower, middle, _) = g.levels();
        let mut map = ChunkMap::new();
        let coord = ChunkCoord::new(0, 0);
        g.generate(&mut map, coord).unwrap();

        let chunk = map.get(coord).unwrap();
        assert_eq!(g.classify(coord), Biome::Plains);
        assert_eq!(chunk.biome, Some(Biome::Plains));

        // Blending is a convex mix, so no column rises above the highest peak
        // among the biomes it can draw from. Every elevation curve peaks at
        // full-scale noise.
        let peak = ChunkMap::ring(coord, 49)
            .unwrap()
            .iter()
            .filter_map(|c| map.get(*c).and_then(|ch| ch.biome))
            .map(|biome| biome.elevation(|_, _| 1.0, 0.0, 0.0))
            .fold(f64::MIN, f64::max);
        let ceiling = g.column_height(peak);

        for x in 0..CHUNK_WIDTH {
            for y in 0..CHUNK_HEIGHT {
                let h = chunk.height(x, y) as f64;
                assert!(h > lower && h < ceiling, "column ({x}, {y}) height {h} outside ({lower}, {ceiling})");
                // water fills every column up to sea level
                assert!(h >= middle.floor());
            }
        }
    }

    #[test]
    fn test_removing_top_voxel_exposes_next_solid() {
        let g = generator();
        let mut map = ChunkMap::new();
        let coord = ChunkCoord::new(0, 0);
        g.generate(&mut map, coord).unwrap();

        for (x, y) in [(0, 0), (7, 9), (15, 15)] {
            let top = map.height_at(x, y) as i32;
            let next = (0..top).rev().find(|&z| map.voxel_at(x, y, z) != AIR).unwrap_or(0);
            assert!(map.set_voxel(x, y, top, AIR));
            assert_eq!(map.height_at(x, y) as i32, next);
        }
    }

    #[test]
    fn test_populate_generates_five_by_five() {
        let g = generator();
        let mut map = ChunkMap::new();
        let coord = ChunkCoord::new(0, 0);
        g.populate(&mut map, coord).unwrap();

        for c in ChunkMap::ring(coord, 25).unwrap() {
            assert!(map.get(c).unwrap().is_generated());
        }
        let chunk = map.get(coord).unwrap();
        assert_eq!(chunk.stage, Stage::Populated);
        assert!(chunk.structures.is_empty());
        assert!(chunk.rng.is_none());
        assert!(!map.get(ChunkCoord::new(3, 0)).unwrap().is_generated());
    }

    #[test]
    fn test_stages_are_idempotent() {
        let g = generator();
        let mut map = ChunkMap::new();
        let coord = ChunkCoord::new(0, 0);
        g.populate(&mut map, coord).unwrap();
        let before = map.get(coord).unwrap().voxels.clone();

        g.populate(&mut map, coord).unwrap();
        g.generate(&mut map, coord).unwrap();
        g.seed_chunk(&mut map, coord).unwrap();
        assert_eq!(map.get(coord).unwrap().voxels, before);
    }
}
