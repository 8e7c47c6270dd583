//! Deferred structures and the growers that place them
//!
//! Structures are recorded while a chunk generates and replayed once its
//! 5x5 neighborhood exists, so they may write across chunk borders.

use std::f64::consts::PI;

use glam::{DVec3, IVec3};

use crate::core::types::Result;
use crate::voxel::block::{
    BlockId, BlockSet, AIR, COAL, DIAMOND, DIRT, GOLD, GRASS, IRON, LEAF, LOG, MARSH, MOSSY_BRICK,
    PATCH, PLANT, SAND, SANDSTONE, STONE, TUFT, TWIG,
};
use crate::voxel::chunk::{CaveSeed, ChunkRng};
use crate::voxel::map::{ChunkMap, Sphere};

/// Blocks a cave tunnel removes.
pub const CAVE_BLOCKS: BlockSet =
    BlockSet::of(&[STONE, GRASS, DIRT, SAND, SANDSTONE, MARSH, GOLD, IRON, COAL, DIAMOND]);

/// Blocks an ore vein may replace.
pub const VEIN_BLOCKS: BlockSet = BlockSet::of(&[STONE]);

/// Spline segments per cave tunnel.
const CAVE_SEGMENTS: u32 = 9;

/// Ore kinds: (block, veins per 10k blocks, depth bias exponent, radius).
pub const ORES: [(BlockId, f64, i32, f64); 4] = [
    (DIAMOND, 3.0, 6, 1.5),
    (GOLD, 6.0, 4, 1.6),
    (IRON, 10.0, 2, 1.7),
    (COAL, 12.0, 1, 1.9),
];

/// A structure waiting to be placed.
#[derive(Clone, Debug, PartialEq)]
pub enum Structure {
    Pine(IVec3),
    Tree(IVec3),
    Plant(IVec3),
    Tuft(IVec3),
    Twig(IVec3),
    Monolith(IVec3),
    Vein { block: BlockId, center: DVec3, radius: f64 },
    Cave { from: CaveSeed, to: CaveSeed },
}

impl Structure {
    /// Place the structure into the map, drawing randomness from the owning chunk.
    pub fn apply(&self, map: &mut ChunkMap, rng: &mut ChunkRng) -> Result<()> {
        match *self {
            Structure::Cave { from, to } => carve_cave(map, from, to),
            Structure::Monolith(p) => grow_monolith(map, p, rng),
            Structure::Vein { block, center, radius } => {
                fill_sphere_over(map, center, radius, block, &VEIN_BLOCKS);
                Ok(())
            }
            Structure::Tree(p) => {
                if below(map, p) == GRASS {
                    grow_tree(map, p, rng)?;
                }
                Ok(())
            }
            Structure::Pine(p) => {
                if below(map, p) == GRASS {
                    grow_pine(map, p, rng)?;
                }
                Ok(())
            }
            Structure::Plant(p) => {
                if below(map, p) == GRASS {
                    map.set_voxel(p.x, p.y, p.z, PLANT);
                }
                Ok(())
            }
            Structure::Tuft(p) => {
                if matches!(below(map, p), GRASS | SAND) {
                    map.set_voxel(p.x, p.y, p.z, TUFT);
                }
                Ok(())
            }
            Structure::Twig(p) => {
                if below(map, p) == SAND {
                    map.set_voxel(p.x, p.y, p.z, TWIG);
                }
                Ok(())
            }
        }
    }
}

fn below(map: &ChunkMap, p: IVec3) -> BlockId {
    map.voxel_at(p.x, p.y, p.z - 1)
}

fn wood(_: IVec3, curr: BlockId) -> BlockId {
    if curr == AIR || curr == LEAF { LOG } else { curr }
}

fn leaves(_: IVec3, curr: BlockId) -> BlockId {
    if curr == AIR { LEAF } else { curr }
}

/// Quintic ease, zero first and second derivative at both ends.
pub fn smootherstep(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    x * x * x * (x * (x * 6.0 - 15.0) + 10.0)
}

/// Tunnel between two cave seeds. Horizontal position and radius move linearly,
/// depth follows a smootherstep so tunnels level out at both ends.
pub fn carve_cave(map: &mut ChunkMap, from: CaveSeed, to: CaveSeed) -> Result<()> {
    let a = from.position.as_dvec3();
    let b = to.position.as_dvec3();
    let mut start = Sphere { center: a, radius: from.radius };

    for step in 1..=CAVE_SEGMENTS {
        let f = step as f64 / CAVE_SEGMENTS as f64;
        let mut center = a.lerp(b, f);
        center.z = a.z + (b.z - a.z) * smootherstep(f);
        let end = Sphere { center, radius: from.radius + (to.radius - from.radius) * f };

        map.rasterize_segment(start, end, |_, curr| if CAVE_BLOCKS.contains(curr) { AIR } else { curr })?;
        start = end;
    }
    Ok(())
}

/// Replace blocks in `allowed` inside a sphere sampled on a unit lattice around `center`.
pub fn fill_sphere_over(map: &mut ChunkMap, center: DVec3, radius: f64, block: BlockId, allowed: &BlockSet) {
    let steps = (2.0 * radius).floor() as i32;
    for i in 0..=steps {
        for j in 0..=steps {
            for k in 0..=steps {
                let p = center - DVec3::splat(radius) + DVec3::new(i as f64, j as f64, k as f64);
                if p.distance(center) < radius {
                    let cell = p.floor().as_ivec3();
                    map.set_iff(cell.x, cell.y, cell.z, block, allowed);
                }
            }
        }
    }
}

/// Conifer: a tapering cone of leaves around a straight trunk.
pub fn grow_pine(map: &mut ChunkMap, p: IVec3, rng: &mut ChunkRng) -> Result<()> {
    let with_leaves = rng.next() > 0.05;
    let height = rng.next() * 2.0 + 4.0;
    let (x, y, z) = (p.x as f64, p.y as f64, p.z as f64);

    let base = Sphere::new(x + rng.next(), y + rng.next(), z, 0.0);
    let base_end = Sphere::new(x + 0.5, y + 0.5, z + height, 0.0);
    if with_leaves {
        let leaf_start = Sphere::new(x + 0.5, y + 0.5, z + 3.0, 1.7);
        let leaf_end = Sphere::new(x + 0.5, y + 0.5, z + height + 4.0, 0.3);
        map.rasterize_cylinder(leaf_start, leaf_end, leaves)?;
    }
    map.rasterize_segment(base, base_end, wood)
}

/// Broadleaf tree: a leaning trunk, three branches and a ball of leaves on each.
pub fn grow_tree(map: &mut ChunkMap, p: IVec3, rng: &mut ChunkRng) -> Result<()> {
    let with_leaves = rng.next() > 0.05;
    let h = rng.next();
    let mut height = h * h * 2.0 + 3.0;
    let base_radius = height / 10.0;
    if height > 4.2 {
        height *= 3.2;
    }
    let (x, y, z) = (p.x as f64, p.y as f64, p.z as f64);

    let top = Sphere::new(
        x + 0.5 + (rng.next() - 0.5) * height / 4.0,
        y + 0.5 + (rng.next() - 0.5) * height / 4.0,
        z + height,
        0.4,
    );
    map.rasterize_segment(Sphere::new(x + 0.5, y + 0.5, z, base_radius), top, wood)?;

    let heading = rng.next() * PI;
    for i in 0..3 {
        let angle = heading + i as f64 * PI * 2.0 / 3.0;
        let len = rng.next() * 2.0 + height / 2.0;
        let bx = x + 0.5 + angle.sin() * len;
        let by = y + 0.5 + angle.cos() * len;
        let bz = z + height + 2.0 + rng.next();
        let crown = rng.next() + 1.0;

        map.rasterize_segment(Sphere::new(bx, by, bz, 0.0), top, wood)?;
        if with_leaves {
            let tip = Sphere::new(bx, by, bz - 1.0, 1.0);
            let tip_top = Sphere::new((bx + x) / 2.0, (by + y) / 2.0, bz + 1.0, crown);
            map.rasterize_segment(tip, tip_top, leaves)?;
        }
    }
    Ok(())
}

/// Stepped hollow tower of mossy brick with a marker block inside.
pub fn grow_monolith(map: &mut ChunkMap, p: IVec3, rng: &mut ChunkRng) -> Result<()> {
    let (x, y, z) = (p.x as f64 + 0.5, p.y as f64 + 0.5, p.z as f64);
    let tier = rng.next() * 4.0 + 4.0;

    for i in 0..4 {
        let r = 7.0 - i as f64;
        let lo = Sphere::new(x, y, z + i as f64 * tier, r);
        let hi = Sphere::new(x, y, z + (i + 1) as f64 * tier, r);
        map.rasterize_cylinder(lo, hi, |_, curr| if curr == AIR { MOSSY_BRICK } else { curr })?;
    }
    for i in 0..4 {
        let r = 5.0 - i as f64;
        let lo = Sphere::new(x, y, z + i as f64 * tier, r);
        let hi = Sphere::new(x, y, z + (i + 1) as f64 * tier, r);
        map.rasterize_cylinder(lo, hi, |_, curr| if curr == MOSSY_BRICK { AIR } else { curr })?;
    }
    map.rasterize_segment(
        Sphere::new(x, y, z + 4.0, 0.1),
        Sphere::new(x, y, z + 4.1, 0.0),
        |_, curr| if curr == AIR { PATCH } else { curr },
    )
}
