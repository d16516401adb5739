//! Volume shapes: per-LOD tessellations split into faces.
//!
//! A [`VolumeShape`] is immutable once built and shared between every object
//! with the same [`ShapeParams`] and detail level (see
//! [`ShapeCache`](crate::resources::ShapeCache)).

use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::errors::{PipelineError, Result};
use crate::math::BoundingBox;
use crate::resources::skin::SkinBinding;

/// Largest vertex count a single face (and a single buffer) may address.
pub const MAX_FACE_VERTICES: usize = u16::MAX as usize;

/// Number of discrete detail levels.
pub const LOD_COUNT: usize = 4;

/// Finest detail level.
pub const MAX_LOD: u8 = (LOD_COUNT - 1) as u8;

/// Marker level of a shape whose geometry has not streamed in at all.
pub const UNRESOLVED_LOD: u8 = u8::MAX;

/// Tessellation density multiplier of each detail level.
pub const DETAIL_SCALES: [f32; LOD_COUNT] = [1.0, 1.5, 2.5, 4.0];

/// A contiguous block of vertices and triangle indices rendered with one
/// material entry.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeFace {
    /// Face slot; also the index of the material entry on the owning object.
    pub slot: usize,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u16>,
    pub bounds: BoundingBox,
}

impl VolumeFace {
    /// Builds a face and computes its bounds.
    ///
    /// `normals` and `uvs` must be empty or match `positions` in length.
    /// Zero-sized faces are accepted; the batch builder drops them.
    pub fn new(
        slot: usize,
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        indices: Vec<u16>,
    ) -> Result<Self> {
        let vertex_count = positions.len();
        if vertex_count > MAX_FACE_VERTICES {
            return Err(PipelineError::BufferOverflow {
                requested: vertex_count,
                limit: MAX_FACE_VERTICES,
            });
        }
        if (!normals.is_empty() && normals.len() != vertex_count)
            || (!uvs.is_empty() && uvs.len() != vertex_count)
        {
            return Err(PipelineError::InconsistentTopology(format!(
                "face {slot}: {vertex_count} positions, {} normals, {} uvs",
                normals.len(),
                uvs.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| usize::from(i) >= vertex_count) {
            return Err(PipelineError::InconsistentTopology(format!(
                "face {slot}: index {bad} out of range for {vertex_count} vertices"
            )));
        }
        debug_assert!(
            indices.len() % 3 == 0,
            "face {slot}: {} indices is not a whole number of triangles",
            indices.len()
        );

        let bounds = BoundingBox::from_points(&positions);
        Ok(Self {
            slot,
            positions,
            normals,
            uvs,
            indices,
            bounds,
        })
    }

    #[must_use]
    pub fn empty(slot: usize) -> Self {
        Self {
            slot,
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
            bounds: BoundingBox::EMPTY,
        }
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Contributes nothing to a draw.
    #[inline]
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Recomputes bounds from positions in one pass.
    pub fn recompute_bounds(&mut self) {
        self.bounds = BoundingBox::from_points(&self.positions);
    }
}

/// Identity of a mesh asset in the mesh repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

/// Definition a shape is tessellated from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeParams {
    /// Unit cube centered on the origin, one face per side.
    Box,
    /// Sphere of diameter one, a single face.
    Sphere,
    /// Y-aligned cylinder of diameter and height one: side, top and bottom faces.
    /// `top_scale` shrinks the top cap (0 gives a cone).
    Cylinder { top_scale: f32 },
    /// Externally authored mesh with per-LOD face data.
    Mesh(MeshId),
}

impl ShapeParams {
    #[inline]
    #[must_use]
    pub fn is_mesh(&self) -> bool {
        matches!(self, Self::Mesh(_))
    }

    /// Number of face slots the definition produces.
    #[must_use]
    pub fn primitive_face_count(&self) -> Option<usize> {
        match self {
            Self::Box => Some(6),
            Self::Sphere => Some(1),
            Self::Cylinder { .. } => Some(3),
            Self::Mesh(_) => None,
        }
    }

    /// Radius used for LOD selection, for an object scaled by `scale`.
    #[inline]
    #[must_use]
    pub fn lod_radius(&self, scale: Vec3) -> f32 {
        (scale * 0.5).length()
    }

    /// Stable bytes identifying the definition, for content addressing.
    pub(crate) fn key_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        let (tag, payload): (u32, u64) = match *self {
            Self::Box => (1, 0),
            Self::Sphere => (2, 0),
            Self::Cylinder { top_scale } => (3, u64::from(top_scale.to_bits())),
            Self::Mesh(id) => (4, id.0),
        };
        out[..4].copy_from_slice(&tag.to_le_bytes());
        out[4..].copy_from_slice(&payload.to_le_bytes());
        out
    }
}

/// Streaming mesh repository.
///
/// Returns `None` for a level that has not arrived yet.
pub trait MeshSource {
    fn lod_faces(&self, mesh: MeshId, lod: u8) -> Option<Arc<[VolumeFace]>>;

    fn skin_binding(&self, _mesh: MeshId) -> Option<Arc<SkinBinding>> {
        None
    }
}

impl MeshSource for () {
    fn lod_faces(&self, _mesh: MeshId, _lod: u8) -> Option<Arc<[VolumeFace]>> {
        None
    }
}

/// Content hash of a shape definition at one detail level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeKey(pub u64);

/// An immutable tessellation at one detail level.
#[derive(Debug, Clone)]
pub struct VolumeShape {
    pub key: ShapeKey,
    pub params: ShapeParams,
    /// Level actually built; may be coarser than requested while streaming.
    pub lod: u8,
    pub faces: Vec<VolumeFace>,
    pub bounds: BoundingBox,
}

impl VolumeShape {
    #[must_use]
    pub fn new(key: ShapeKey, params: ShapeParams, lod: u8, faces: Vec<VolumeFace>) -> Self {
        let mut bounds = BoundingBox::EMPTY;
        for face in &faces {
            bounds.extend(&face.bounds);
        }
        Self {
            key,
            params,
            lod,
            faces,
            bounds,
        }
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.lod != UNRESOLVED_LOD
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.faces.iter().map(VolumeFace::vertex_count).sum()
    }
}
