//! Greedy surface extraction with per-corner light
//!
//! Meshing runs in two passes over a [`PaddedChunk`]:
//!
//! 1. **Scan** every column from just above its height down to the floor,
//!    decide which faces of each voxel are exposed, and pack each exposed
//!    face (atlas tile, four corner lights, render target) into a scratch
//!    buffer per face direction.
//! 2. **Merge** each scratch buffer: starting at the first set cell, grow a
//!    rectangle along the primary axis while the packed value repeats, then
//!    along the secondary axis while whole rows still match, clear what it
//!    covers and emit one quad.
//!
//! Cross-section foliage skips both passes and emits two crossed quads.

use glam::IVec3;

use crate::core::types::Result;
use crate::math::aabb::Aabb;
use crate::meshing::buffer::{ChunkMesh, MeshBuffer, MeshTarget, Vertex, VERTEX_CEILING};
use crate::meshing::faces::{merge_axes, FaceGeometry};
use crate::voxel::block::{self, BlockId, BlockType, CullMask, AIR};
use crate::voxel::chunk::{index3d, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_VOLUME, CHUNK_WIDTH};
use crate::voxel::face::Face;
use crate::voxel::padded::PaddedChunk;

/// Marks a scratch cell as holding a face, so an all-zero face still merges.
const PRESENT: u32 = 1 << 30;

/// Highest corner light a vertex can carry.
const MAX_CORNER_LIGHT: i32 = 31;

/// How a neighbor hides a face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Occlusion {
    Visible,
    Hidden,
    /// Leaf against leaf; resolved by the quality tier.
    SameFoliage,
}

/// A merged rectangle of identical faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quad {
    pub face: Face,
    /// Minimum voxel covered by the quad.
    pub origin: IVec3,
    /// Extent along the face's primary merge axis.
    pub primary: i32,
    /// Extent along the face's secondary merge axis.
    pub secondary: i32,
    /// Packed atlas, corner lights and target.
    pub data: u32,
}

impl Quad {
    pub fn target(&self) -> MeshTarget {
        MeshTarget::from_bits(self.data)
    }

    pub fn atlas(&self) -> u8 {
        (self.data >> 22 & 0xff) as u8
    }

    /// Corner lights in corner order.
    pub fn corner_lights(&self) -> [u8; 4] {
        [17, 12, 7, 2].map(|shift| (self.data >> shift & 31) as u8)
    }

    /// Voxels whose `face` this quad covers.
    pub fn cells(&self) -> impl Iterator<Item = IVec3> + '_ {
        let [a1, a2, _] = merge_axes(self.face);
        (0..self.secondary).flat_map(move |s| (0..self.primary).map(move |p| self.origin + a1 * p + a2 * s))
    }
}

/// A cross-section voxel to be drawn as two billboards.
#[derive(Clone, Copy, Debug)]
struct Cross {
    position: IVec3,
    light: u8,
    atlas: u8,
}

/// Running min/max of voxels that produced geometry.
#[derive(Clone, Copy, Debug)]
struct Bounds {
    min: IVec3,
    max: IVec3,
}

impl Bounds {
    fn include(bounds: &mut Option<Bounds>, cell: IVec3) {
        match bounds {
            Some(b) => {
                b.min = b.min.min(cell);
                b.max = b.max.max(cell + IVec3::ONE);
            }
            None => *bounds = Some(Bounds { min: cell, max: cell + IVec3::ONE }),
        }
    }

    fn to_aabb(self) -> Aabb {
        Aabb::new(self.min.as_vec3(), self.max.as_vec3())
    }
}

/// Turns padded chunk snapshots into meshes.
///
/// The six face scratch buffers are kept between calls, so one mesher should
/// be reused for many chunks.
pub struct GreedyMesher {
    quality: u8,
    ceiling: usize,
    scratch: Vec<Vec<u32>>,
}

impl GreedyMesher {
    /// Mesher for a shading tier (0..=3; higher values behave like 3).
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.min(3),
            ceiling: VERTEX_CEILING,
            scratch: vec![vec![0; CHUNK_VOLUME]; 6],
        }
    }

    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    fn fancy(&self) -> bool {
        self.quality > 0
    }

    /// Mesh a chunk snapshot.
    pub fn tesselate(&mut self, padded: &PaddedChunk) -> Result<ChunkMesh> {
        let mut crosses = Vec::new();
        let bounds = self.scan(padded, &mut crosses)?;
        let quads = self.merge();

        let mut mesh = ChunkMesh::empty(padded.coord);
        for cross in &crosses {
            emit_cross(&mut mesh.unculled, cross);
        }
        for quad in &quads {
            emit_quad(mesh.buffer_mut(quad.target()), quad);
        }
        mesh.bounds = bounds.map(Bounds::to_aabb);
        mesh.enforce_ceiling(self.ceiling);
        Ok(mesh)
    }

    /// Merged face quads of a chunk, without building vertex buffers.
    pub fn quads(&mut self, padded: &PaddedChunk) -> Result<Vec<Quad>> {
        let mut crosses = Vec::new();
        self.scan(padded, &mut crosses)?;
        Ok(self.merge())
    }

    fn scan(&mut self, padded: &PaddedChunk, crosses: &mut Vec<Cross>) -> Result<Option<Bounds>> {
        let scanned = self.scan_columns(padded, crosses);
        if scanned.is_err() {
            // merge never runs, so drop the faces recorded before the failure
            for buffer in &mut self.scratch {
                buffer.fill(0);
            }
        }
        scanned
    }

    fn scan_columns(&mut self, padded: &PaddedChunk, crosses: &mut Vec<Cross>) -> Result<Option<Bounds>> {
        let mut bounds = None;
        for x in 0..CHUNK_WIDTH as i32 {
            for y in 0..CHUNK_HEIGHT as i32 {
                let top = (padded.height(x, y) as i32 + 1).min(CHUNK_DEPTH as i32 - 1);
                for z in (0..=top).rev() {
                    if self.add_voxel(padded, IVec3::new(x, y, z), crosses)? {
                        Bounds::include(&mut bounds, IVec3::new(x, y, z));
                    }
                }
            }
        }
        Ok(bounds)
    }

    /// Record the exposed faces of one voxel. Returns whether it produced geometry.
    fn add_voxel(&mut self, padded: &PaddedChunk, pos: IVec3, crosses: &mut Vec<Cross>) -> Result<bool> {
        let here = padded.at(pos.x, pos.y, pos.z);
        if here == AIR {
            return Ok(false);
        }
        let block = block::lookup(here)?;

        if block.cross_section {
            crosses.push(Cross {
                position: pos,
                light: padded.light(pos.x, pos.y, pos.z)?,
                atlas: block.atlas[0],
            });
            return Ok(true);
        }

        let mut exposed = [false; 6];
        for face in Face::ALL {
            let n = pos + face.offset();
            let occlusion = occludes(padded.at(n.x, n.y, n.z), here)?;
            exposed[face.index()] = match occlusion {
                Occlusion::Visible => true,
                Occlusion::Hidden => false,
                Occlusion::SameFoliage => self.fancy() && face.is_negative(),
            };
        }
        if !exposed.contains(&true) {
            return Ok(false);
        }

        let target = match (self.fancy(), block.cull) {
            (true, CullMask::Transparent) => MeshTarget::Transparent,
            (true, CullMask::Cross) => MeshTarget::Unculled,
            _ => MeshTarget::Opaque,
        };
        let index = index3d(pos.x as usize, pos.y as usize, pos.z as usize);
        for face in Face::ALL {
            if exposed[face.index()] {
                let data = self.face_data(padded, block, pos, face, &exposed)?;
                self.scratch[face.index()][index] = PRESENT | data << 2 | target as u32;
            }
        }
        Ok(true)
    }

    /// Pack the atlas tile and corner lights of one face.
    fn face_data(&self, padded: &PaddedChunk, block: &BlockType, pos: IVec3, face: Face, exposed: &[bool; 6]) -> Result<u32> {
        let geometry = FaceGeometry::of(face);
        let front = pos + face.offset();
        let mut light = padded.light(front.x, front.y, front.z)? as i32;
        let light_at = |offset: [i32; 3]| -> Result<i32> {
            let n = pos + IVec3::from(offset);
            Ok(padded.light(n.x, n.y, n.z)? as i32)
        };

        let mut corners = [light; 4];
        match self.quality {
            0 => {
                match face {
                    Face::Up => light += 1,
                    Face::Down => {}
                    _ => light -= 1,
                }
                corners = [light; 4];
            }
            1 => {
                match face {
                    Face::Up => light += 1,
                    Face::Down => light -= 1,
                    _ => {}
                }
                let mut darker = false;
                for i in (0..8).step_by(2) {
                    darker |= light_at(geometry.neighbors[i])? < light;
                }
                if darker {
                    light -= 1;
                }
                corners = [light; 4];
            }
            quality => {
                let step = if quality == 3 { 1 } else { 2 };
                let mut aos = [light; 8];
                for i in (0..8).step_by(step) {
                    aos[i] = light_at(geometry.neighbors[i])?;
                }
                for (value, corner) in corners.iter_mut().zip(geometry.corners.iter()) {
                    let [a0, a1, a2] = corner.aos;
                    *value = (light + aos[a0] + aos[a2] + aos[a1]).div_euclid(4);
                    if quality == 3 && exposed[corner.masks[0]] && exposed[corner.masks[1]] {
                        *value += 1;
                    }
                }
            }
        }

        let atlas = block.atlas[face.index()] as u32;
        let packed = corners
            .iter()
            .fold(atlas, |acc, &c| acc << 5 | c.clamp(0, MAX_CORNER_LIGHT) as u32);
        Ok(packed)
    }

    /// Merge every scratch buffer into quads, clearing the buffers.
    fn merge(&mut self) -> Vec<Quad> {
        let mut quads = Vec::new();
        for face in Face::ALL {
            let [a1, a2, a3] = merge_axes(face);
            let (len1, len2, len3) = (axis_len(a1), axis_len(a2), axis_len(a3));
            let buffer = &mut self.scratch[face.index()];

            for slice in 0..len3 {
                for j in 0..len2 {
                    for k in 0..len1 {
                        let origin = a3 * slice + a2 * j + a1 * k;
                        let data = buffer[cell(origin)];
                        if data == 0 {
                            continue;
                        }
                        buffer[cell(origin)] = 0;

                        let mut primary = 1;
                        while k + primary < len1 {
                            let id = cell(origin + a1 * primary);
                            if buffer[id] != data {
                                break;
                            }
                            buffer[id] = 0;
                            primary += 1;
                        }

                        let mut secondary = 1;
                        while j + secondary < len2 {
                            let row = origin + a2 * secondary;
                            if !(0..primary).all(|p| buffer[cell(row + a1 * p)] == data) {
                                break;
                            }
                            for p in 0..primary {
                                buffer[cell(row + a1 * p)] = 0;
                            }
                            secondary += 1;
                        }

                        quads.push(Quad { face, origin, primary, secondary, data });
                    }
                }
            }
        }
        quads
    }
}

/// Classify how `check` hides a face of `target`.
fn occludes(check: BlockId, target: BlockId) -> Result<Occlusion> {
    if check == AIR {
        return Ok(Occlusion::Visible);
    }
    let block = block::lookup(check)?;
    Ok(match block.cull {
        CullMask::Opaque => Occlusion::Hidden,
        CullMask::Cross if !block.cross_section && check == target => Occlusion::SameFoliage,
        CullMask::Transparent if check == target => Occlusion::Hidden,
        _ => Occlusion::Visible,
    })
}

fn axis_len(axis: IVec3) -> i32 {
    if axis.x != 0 {
        CHUNK_WIDTH as i32
    } else if axis.y != 0 {
        CHUNK_HEIGHT as i32
    } else {
        CHUNK_DEPTH as i32
    }
}

#[inline]
fn cell(pos: IVec3) -> usize {
    index3d(pos.x as usize, pos.y as usize, pos.z as usize)
}

fn vertex(pos: IVec3, light: u8, atlas: u8, uv: [u16; 2]) -> Vertex {
    Vertex {
        position: [pos.x as u16, pos.y as u16, pos.z as u16],
        light,
        atlas,
        uv,
    }
}

fn emit_quad(target: &mut MeshBuffer, quad: &Quad) {
    let [a1, a2, a3] = merge_axes(quad.face);
    let size = a1 * quad.primary + a2 * quad.secondary + a3;
    let (tw, th) = if quad.face == Face::Up {
        (quad.secondary as u16, quad.primary as u16)
    } else {
        (quad.primary as u16, quad.secondary as u16)
    };
    let uvs = [[0, 0], [tw, 0], [0, th], [tw, th]];
    let lights = quad.corner_lights();
    let atlas = quad.atlas();

    let geometry = FaceGeometry::of(quad.face);
    let mut ids = [0u32; 4];
    for (i, corner) in geometry.corners.iter().enumerate() {
        let pos = quad.origin + IVec3::from(corner.offset) * size;
        ids[i] = target.push_vertex(vertex(pos, lights[i], atlas, uvs[i]));
    }

    let [c1, c2, c3, c4] = ids;
    if lights[0] as u32 + lights[3] as u32 <= lights[1] as u32 + lights[2] as u32 {
        target.push_quad(c1, c2, c3, c4);
    } else {
        // split along the brighter diagonal
        target.push_quad_flipped(c1, c2, c3, c4);
    }
}

fn emit_cross(target: &mut MeshBuffer, cross: &Cross) {
    let Cross { position: p, light, atlas } = *cross;
    let at = |dx, dy, dz, uv| vertex(p + IVec3::new(dx, dy, dz), light, atlas, uv);

    let c1 = target.push_vertex(at(1, 1, 0, [1, 1]));
    let c2 = target.push_vertex(at(0, 0, 0, [0, 1]));
    let c3 = target.push_vertex(at(1, 1, 1, [1, 0]));
    let c4 = target.push_vertex(at(0, 0, 1, [0, 0]));
    target.push_quad(c1, c2, c3, c4);

    let c1 = target.push_vertex(at(0, 1, 1, [0, 0]));
    let c2 = target.push_vertex(at(0, 1, 0, [0, 1]));
    let c3 = target.push_vertex(at(1, 0, 1, [1, 0]));
    let c4 = target.push_vertex(at(1, 0, 0, [1, 1]));
    target.push_quad(c1, c2, c3, c4);
}
