//! Vertex and index buffers produced by the mesher

use bytemuck::{Pod, Zeroable};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::math::aabb::Aabb;
use crate::voxel::chunk::ChunkCoord;

/// Vertex count above which a buffer is discarded instead of handed out.
pub const VERTEX_CEILING: usize = 65_000;

/// Packed mesh vertex (12 bytes).
///
/// Positions are chunk-local voxel corners; `uv` counts whole tiles so a
/// merged quad repeats its texture once per covered voxel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [u16; 3],
    /// Corner light, 0..=31.
    pub light: u8,
    /// Atlas tile index.
    pub atlas: u8,
    pub uv: [u16; 2],
}

/// Render state a buffer is drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshTarget {
    /// Back-face culled, depth-written.
    Opaque = 0,
    /// Blended, drawn last.
    Transparent = 1,
    /// Foliage drawn without back-face culling.
    Unculled = 2,
}

impl MeshTarget {
    /// Decode the two low bits of a packed face.
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            1 => MeshTarget::Transparent,
            2 => MeshTarget::Unculled,
            _ => MeshTarget::Opaque,
        }
    }
}

/// Indexed triangle list for one render target.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshBuffer {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Set when the buffer grew past the vertex ceiling and was emptied.
    pub overflowed: bool,
}

impl MeshBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex, returning its index.
    pub fn push_vertex(&mut self, vertex: Vertex) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    /// Append a quad as two triangles sharing the c2-c3 diagonal.
    pub fn push_quad(&mut self, c1: u32, c2: u32, c3: u32, c4: u32) {
        self.indices.extend_from_slice(&[c1, c2, c3, c3, c2, c4]);
    }

    /// Append a quad split along the c1-c4 diagonal instead.
    pub fn push_quad_flipped(&mut self, c1: u32, c2: u32, c3: u32, c4: u32) {
        self.indices.extend_from_slice(&[c1, c2, c4, c1, c4, c3]);
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Raw vertex data, ready for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Empty the buffer if it holds more than `ceiling` vertices.
    ///
    /// Returns the overflow as an error value for reporting; the buffer is
    /// left empty and flagged rather than partially filled.
    pub fn enforce_ceiling(&mut self, target: MeshTarget, ceiling: usize) -> Option<Error> {
        let vertices = self.vertices.len();
        if vertices <= ceiling {
            return None;
        }
        self.vertices = Vec::new();
        self.indices = Vec::new();
        self.overflowed = true;
        Some(Error::MeshOverflow { target, vertices, ceiling })
    }
}

/// Mesh of one chunk, one buffer per render target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkMesh {
    pub coord: ChunkCoord,
    pub opaque: MeshBuffer,
    pub unculled: MeshBuffer,
    pub transparent: MeshBuffer,
    /// Chunk-local box around every voxel that produced geometry.
    pub bounds: Option<Aabb>,
}

impl ChunkMesh {
    pub fn empty(coord: ChunkCoord) -> Self {
        Self {
            coord,
            opaque: MeshBuffer::new(),
            unculled: MeshBuffer::new(),
            transparent: MeshBuffer::new(),
            bounds: None,
        }
    }

    pub fn buffer(&self, target: MeshTarget) -> &MeshBuffer {
        match target {
            MeshTarget::Opaque => &self.opaque,
            MeshTarget::Transparent => &self.transparent,
            MeshTarget::Unculled => &self.unculled,
        }
    }

    pub fn buffer_mut(&mut self, target: MeshTarget) -> &mut MeshBuffer {
        match target {
            MeshTarget::Opaque => &mut self.opaque,
            MeshTarget::Transparent => &mut self.transparent,
            MeshTarget::Unculled => &mut self.unculled,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.opaque.triangle_count() + self.unculled.triangle_count() + self.transparent.triangle_count()
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.unculled.is_empty() && self.transparent.is_empty()
    }

    /// Apply the vertex ceiling to all three buffers, logging each overflow.
    pub fn enforce_ceiling(&mut self, ceiling: usize) {
        for target in [MeshTarget::Opaque, MeshTarget::Unculled, MeshTarget::Transparent] {
            if let Some(err) = self.buffer_mut(target).enforce_ceiling(target, ceiling) {
                warn!("Chunk ({}, {}): {}", self.coord.x, self.coord.y, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: u16) -> Vertex {
        Vertex { position: [x, 0, 0], light: 15, atlas: 1, uv: [0, 0] }
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 12);
        let mut buffer = MeshBuffer::new();
        buffer.push_vertex(vertex(3));
        let bytes = buffer.vertex_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(u16::from_ne_bytes([bytes[0], bytes[1]]), 3);
        assert_eq!(bytes[6], 15);
        assert_eq!(bytes[7], 1);
    }

    #[test]
    fn test_quad_indices() {
        let mut buffer = MeshBuffer::new();
        let ids: Vec<u32> = (0..4).map(|i| buffer.push_vertex(vertex(i))).collect();
        buffer.push_quad(ids[0], ids[1], ids[2], ids[3]);
        buffer.push_quad_flipped(ids[0], ids[1], ids[2], ids[3]);
        assert_eq!(buffer.indices, vec![0, 1, 2, 2, 1, 3, 0, 1, 3, 0, 3, 2]);
        assert_eq!(buffer.triangle_count(), 4);
    }

    #[test]
    fn test_ceiling_empties_buffer() {
        let mut buffer = MeshBuffer::new();
        for i in 0..8 {
            buffer.push_vertex(vertex(i));
        }
        buffer.push_quad(0, 1, 2, 3);

        assert!(buffer.enforce_ceiling(MeshTarget::Opaque, 8).is_none());
        let err = buffer.enforce_ceiling(MeshTarget::Opaque, 7).unwrap();
        assert!(matches!(err, Error::MeshOverflow { vertices: 8, ceiling: 7, .. }));
        assert!(buffer.is_empty());
        assert!(buffer.indices.is_empty());
        assert!(buffer.overflowed);
    }

    #[test]
    fn test_target_bits() {
        for target in [MeshTarget::Opaque, MeshTarget::Transparent, MeshTarget::Unculled] {
            assert_eq!(MeshTarget::from_bits(target as u32 | 0b1100), target);
        }
    }
}
