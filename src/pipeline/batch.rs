//! Draw batch construction.
//!
//! Greedily merges the faces of one render pass into shared vertex/index
//! buffers and splits each buffer into [`DrawBatch`] ranges that can be drawn
//! with one GPU state.
//!
//! # Ordering
//!
//! - [`BatchMode::DistanceSorted`]: back-to-front by camera distance. Batch
//!   order equals face order; blending depends on it.
//! - [`BatchMode::MaterialSorted`]: stable sort by [`BatchBreakKey`] (bump
//!   map, binormal need, fullbright, glow, texture), so texture-compatible
//!   faces form contiguous runs.
//!
//! # Breaking rules
//!
//! A new batch opens when the face's draw state (fullbright, glow, bump map,
//! binormal need) differs from the running batch, when its texture is not in
//! the batch and the texture list is full (or multiplexing is off), or when
//! either side has a private animated texture matrix. A new buffer (and
//! batch) opens when the running buffer would exceed its vertex ceiling.
//!
//! # Conservation
//!
//! Every surviving face lands in exactly one batch, exactly once. Summed
//! batch vertex and index counts equal the summed face counts. Faces with no
//! vertices or no indices are dropped, as are faces larger than one buffer
//! and faces beyond the spatial group's node budget.

use glam::{Affine3A, Mat3A, Vec2, Vec3};
use log::{debug, warn};
use smallvec::{SmallVec, smallvec};

use crate::math::BoundingBox;
use crate::pipeline::classify::{BatchMode, PassFlags, RenderPass};
use crate::resources::material::{MaterialEntry, TextureId};
use crate::resources::shape::VolumeFace;
use crate::resources::vertex::AttributeMask;
use crate::scene::ObjectKey;
use crate::settings::BatchSettings;

// ============================================================================
// Inputs
// ============================================================================

/// Generation-checked reference from a batch back to a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceRef {
    pub object: ObjectKey,
    pub slot: usize,
    /// Object generation at batch time; a mismatch marks the batch stale.
    pub generation: u32,
}

/// Sort key of material-sorted passes. Field order is comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchBreakKey {
    pub bump: u8,
    pub needs_binormal: bool,
    pub fullbright: bool,
    pub glow: u8,
    pub texture: Option<TextureId>,
}

/// Draw state that must match for two faces to share a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DrawState {
    fullbright: bool,
    glow: u8,
    bump: u8,
    needs_binormal: bool,
}

/// One face queued for a pass.
#[derive(Debug, Clone, Copy)]
pub struct BatchFace<'a> {
    pub face_ref: FaceRef,
    pub face: &'a VolumeFace,
    pub material: &'a MaterialEntry,
    pub flags: PassFlags,
    /// Object-to-world transform applied when writing vertices.
    pub transform: Affine3A,
    /// Camera distance used by distance-sorted passes.
    pub distance: f32,
}

impl BatchFace<'_> {
    #[inline]
    #[must_use]
    pub fn texture(&self) -> Option<TextureId> {
        self.material.texture_id()
    }

    #[inline]
    #[must_use]
    pub fn is_animated(&self) -> bool {
        self.flags.contains(PassFlags::ANIMATED_TEXTURE)
    }

    /// Bump-mapped faces, alpha-only textures and animated texture matrices
    /// cannot share a batch with other textures.
    #[must_use]
    pub fn can_multiplex(&self) -> bool {
        self.material.bump == 0
            && !self.is_animated()
            && !self.material.texture.is_some_and(|t| t.is_alpha_only())
    }

    #[must_use]
    pub fn break_key(&self) -> BatchBreakKey {
        BatchBreakKey {
            bump: self.material.bump,
            needs_binormal: self.flags.contains(PassFlags::NEEDS_BINORMAL),
            fullbright: self.material.fullbright,
            glow: self.material.glow_byte(),
            texture: self.texture(),
        }
    }

    fn state(&self) -> DrawState {
        DrawState {
            fullbright: self.material.fullbright,
            glow: self.material.glow_byte(),
            bump: self.material.bump,
            needs_binormal: self.flags.contains(PassFlags::NEEDS_BINORMAL),
        }
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// Interleaving-agnostic vertex storage shared by consecutive batches.
///
/// Only the channels in `mask` are populated; every populated channel has
/// one entry per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchBuffer {
    pub mask: AttributeMask,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub uvs1: Vec<Vec2>,
    pub colors: Vec<[u8; 4]>,
    pub binormals: Vec<Vec3>,
    pub texture_indices: Vec<u8>,
    pub indices: Vec<u16>,
}

impl BatchBuffer {
    #[must_use]
    pub fn new(mask: AttributeMask) -> Self {
        Self {
            mask,
            ..Self::default()
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

    #[inline]
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.vertex_count() * self.mask.vertex_size() as usize
    }

    /// Raw position data, ready for upload.
    #[must_use]
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Raw 16-bit index data, ready for upload.
    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Writes `face` in world space; indices are rebased onto the buffer.
    fn append(&mut self, face: &BatchFace<'_>, texture_index: u8) {
        let src = face.face;
        let base = self.positions.len() as u32;
        let count = src.vertex_count();

        self.positions
            .extend(src.positions.iter().map(|&p| face.transform.transform_point3(p)));

        if self.mask.contains(AttributeMask::NORMAL) {
            let normal_matrix = normal_matrix(&face.transform);
            if src.normals.len() == count {
                self.normals
                    .extend(src.normals.iter().map(|&n| (normal_matrix * n).normalize_or_zero()));
            } else {
                self.normals.extend(std::iter::repeat_n(Vec3::ZERO, count));
            }
        }
        if self.mask.contains(AttributeMask::TEXCOORD0) {
            extend_uvs(&mut self.uvs, src, count);
        }
        if self.mask.contains(AttributeMask::TEXCOORD1) {
            extend_uvs(&mut self.uvs1, src, count);
        }
        if self.mask.contains(AttributeMask::COLOR) {
            let alpha = (face.material.color_alpha.clamp(0.0, 1.0) * 255.0) as u8;
            self.colors.extend(std::iter::repeat_n([255, 255, 255, alpha], count));
        }
        if self.mask.contains(AttributeMask::BINORMAL) {
            let normal_matrix = normal_matrix(&face.transform);
            self.binormals.extend(
                face_binormals(src)
                    .into_iter()
                    .map(|b| (normal_matrix * b).normalize_or_zero()),
            );
        }
        if self.mask.contains(AttributeMask::TEXTURE_INDEX) {
            self.texture_indices.extend(std::iter::repeat_n(texture_index, count));
        }

        self.indices
            .extend(src.indices.iter().map(|&i| (base + u32::from(i)) as u16));
    }
}

fn normal_matrix(transform: &Affine3A) -> Mat3A {
    transform.matrix3.inverse().transpose()
}

fn extend_uvs(out: &mut Vec<Vec2>, face: &VolumeFace, count: usize) {
    if face.uvs.len() == count {
        out.extend_from_slice(&face.uvs);
    } else {
        out.extend(std::iter::repeat_n(Vec2::ZERO, count));
    }
}

/// Per-vertex binormals from texture-coordinate gradients.
fn face_binormals(face: &VolumeFace) -> Vec<Vec3> {
    let count = face.vertex_count();
    let mut tangents = vec![Vec3::ZERO; count];
    if face.uvs.len() == count {
        for tri in face.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(usize::from);
            if a.max(b).max(c) >= count {
                continue;
            }
            let e1 = face.positions[b] - face.positions[a];
            let e2 = face.positions[c] - face.positions[a];
            let d1 = face.uvs[b] - face.uvs[a];
            let d2 = face.uvs[c] - face.uvs[a];
            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let tangent = (e1 * d2.y - e2 * d1.y) / det;
            for v in [a, b, c] {
                tangents[v] += tangent;
            }
        }
    }
    tangents
        .iter()
        .enumerate()
        .map(|(i, &t)| match face.normals.get(i) {
            Some(&n) => n.cross(t).normalize_or_zero(),
            None => t.normalize_or_zero(),
        })
        .collect()
}

/// A face inside a batch, with the texture slot its vertices index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchMember {
    pub face: FaceRef,
    pub texture_index: u8,
    pub distance: f32,
}

/// A contiguous vertex/index range drawn with one state.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawBatch {
    pub pass: RenderPass,
    /// Index of the buffer in the owning pass's buffer list.
    pub buffer: usize,
    /// First vertex.
    pub start: u32,
    /// One past the last vertex.
    pub end: u32,
    /// Index count.
    pub count: u32,
    /// First index.
    pub offset: u32,
    /// Textures the batch binds, in texture-index order.
    pub textures: SmallVec<[Option<TextureId>; 8]>,
    pub members: Vec<BatchMember>,
    pub fullbright: bool,
    pub glow: u8,
    pub bump: u8,
    pub needs_binormal: bool,
    pub animated_texture: bool,
    /// Only the first texture may ever be bound.
    exclusive: bool,
    pub bounds: BoundingBox,
    /// Farthest member from the camera.
    pub max_distance: f32,
}

impl DrawBatch {
    fn open(
        pass: RenderPass,
        buffer_index: usize,
        buffer: &BatchBuffer,
        face: &BatchFace<'_>,
        multiplexing: bool,
    ) -> Self {
        let state = face.state();
        Self {
            pass,
            buffer: buffer_index,
            start: buffer.vertex_count() as u32,
            end: buffer.vertex_count() as u32,
            count: 0,
            offset: buffer.index_count() as u32,
            textures: smallvec![face.texture()],
            members: Vec::new(),
            fullbright: state.fullbright,
            glow: state.glow,
            bump: state.bump,
            needs_binormal: state.needs_binormal,
            animated_texture: face.is_animated(),
            exclusive: !multiplexing || !face.can_multiplex(),
            bounds: BoundingBox::EMPTY,
            max_distance: 0.0,
        }
    }

    fn state(&self) -> DrawState {
        DrawState {
            fullbright: self.fullbright,
            glow: self.glow,
            bump: self.bump,
            needs_binormal: self.needs_binormal,
        }
    }

    /// Texture slot `face` would use in this batch, or `None` if it must
    /// open a new one.
    fn admit(&mut self, face: &BatchFace<'_>, texture_budget: usize) -> Option<u8> {
        if self.animated_texture || face.is_animated() || self.state() != face.state() {
            return None;
        }
        let texture = face.texture();
        if self.exclusive || !face.can_multiplex() {
            let sole = self.textures.len() == 1 && self.textures[0] == texture;
            if sole {
                self.exclusive = true;
                return Some(0);
            }
            return None;
        }
        if let Some(index) = self.textures.iter().position(|t| *t == texture) {
            return Some(index as u8);
        }
        if self.textures.len() < texture_budget {
            self.textures.push(texture);
            return Some((self.textures.len() - 1) as u8);
        }
        None
    }

    fn push(&mut self, face: &BatchFace<'_>, texture_index: u8) {
        self.end += face.face.vertex_count() as u32;
        self.count += face.face.index_count() as u32;
        self.bounds.extend(&face.face.bounds.transform(&face.transform));
        self.max_distance = self.max_distance.max(face.distance);
        self.members.push(BatchMember {
            face: face.face_ref,
            texture_index,
            distance: face.distance,
        });
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.end - self.start
    }

    #[inline]
    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.count
    }

    #[inline]
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn references(&self, object: ObjectKey) -> bool {
        self.members.iter().any(|m| m.face.object == object)
    }
}

/// Counters of one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub faces_in: usize,
    pub faces_batched: usize,
    pub degenerate_dropped: usize,
    pub overflow_dropped: usize,
    pub vertices: usize,
    pub indices: usize,
    pub buffers: usize,
    pub batches: usize,
}

impl BatchStats {
    pub fn accumulate(&mut self, other: &BatchStats) {
        self.faces_in += other.faces_in;
        self.faces_batched += other.faces_batched;
        self.degenerate_dropped += other.degenerate_dropped;
        self.overflow_dropped += other.overflow_dropped;
        self.vertices += other.vertices;
        self.indices += other.indices;
        self.buffers += other.buffers;
        self.batches += other.batches;
    }
}

/// Buffers and batches of one pass.
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    pub buffers: Vec<BatchBuffer>,
    pub batches: Vec<DrawBatch>,
    pub stats: BatchStats,
}

/// Remaining vertex bytes a spatial group may still fill this rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeBudget {
    remaining: u64,
}

impl NodeBudget {
    #[must_use]
    pub fn from_bytes(bytes: u64) -> Self {
        Self { remaining: bytes }
    }

    #[must_use]
    pub fn unlimited() -> Self {
        Self { remaining: u64::MAX }
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn try_take(&mut self, bytes: u64) -> bool {
        if bytes > self.remaining {
            return false;
        }
        self.remaining -= bytes;
        true
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct BatchBuilder {
    settings: BatchSettings,
}

impl BatchBuilder {
    #[must_use]
    pub fn new(settings: BatchSettings) -> Self {
        Self { settings }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Channels written for a pass: the shader's mask plus the texture index
    /// when multiplexing.
    #[must_use]
    pub fn vertex_mask(&self, shader_mask: AttributeMask) -> AttributeMask {
        let mask = shader_mask | AttributeMask::POSITION;
        if self.settings.texture_multiplexing {
            mask | AttributeMask::TEXTURE_INDEX
        } else {
            mask
        }
    }

    /// Per-buffer vertex ceiling for a pass.
    #[must_use]
    pub fn max_vertices(&self, shader_mask: AttributeMask) -> usize {
        self.settings
            .max_vertices(self.vertex_mask(shader_mask).vertex_size()) as usize
    }

    #[must_use]
    pub fn texture_budget(&self) -> usize {
        self.settings.texture_channel_budget().min(usize::from(u8::MAX) + 1)
    }

    /// Packs the faces of `pass` into buffers and batches.
    ///
    /// Never fails: a pass with no surviving faces yields no batches.
    pub fn build(
        &self,
        pass: RenderPass,
        shader_mask: AttributeMask,
        mut faces: Vec<BatchFace<'_>>,
        mode: BatchMode,
        budget: &mut NodeBudget,
    ) -> BatchOutput {
        let mask = self.vertex_mask(shader_mask);
        let vertex_size = u64::from(mask.vertex_size());
        let max_vertices = self.max_vertices(shader_mask);
        let texture_budget = self.texture_budget();
        let multiplexing = self.settings.texture_multiplexing && texture_budget > 1;

        let mut stats = BatchStats {
            faces_in: faces.len(),
            ..BatchStats::default()
        };

        faces.retain(|f| {
            if f.face.is_degenerate() {
                debug!(
                    "Dropping degenerate face {} of {:?} ({} vertices, {} indices)",
                    f.face_ref.slot,
                    f.face_ref.object,
                    f.face.vertex_count(),
                    f.face.index_count()
                );
                stats.degenerate_dropped += 1;
                return false;
            }
            if f.face.vertex_count() > max_vertices {
                warn!(
                    "Face {} of {:?} has {} vertices, buffer limit is {max_vertices}; not drawn",
                    f.face_ref.slot,
                    f.face_ref.object,
                    f.face.vertex_count()
                );
                stats.overflow_dropped += 1;
                return false;
            }
            true
        });

        match mode {
            BatchMode::DistanceSorted => {
                faces.sort_by(|a, b| b.distance.total_cmp(&a.distance));
            }
            BatchMode::MaterialSorted => faces.sort_by_key(BatchFace::break_key),
        }

        let mut buffers: Vec<BatchBuffer> = Vec::new();
        let mut batches: Vec<DrawBatch> = Vec::new();
        let mut current: Option<usize> = None;
        let mut budget_warned = false;

        for face in &faces {
            let vertices = face.face.vertex_count();
            if !budget.try_take(vertices as u64 * vertex_size) {
                if !budget_warned {
                    warn!(
                        "{} pass: spatial group node budget exhausted; some geometry not drawn",
                        pass.name()
                    );
                    budget_warned = true;
                }
                stats.overflow_dropped += 1;
                continue;
            }

            let needs_buffer = buffers
                .last()
                .is_none_or(|b| b.vertex_count() + vertices > max_vertices);
            if needs_buffer {
                buffers.push(BatchBuffer::new(mask));
                current = None;
            }
            let buffer_index = buffers.len() - 1;

            let admitted = current
                .and_then(|i| batches[i].admit(face, texture_budget).map(|slot| (i, slot)));
            let (batch_index, texture_index) = match admitted {
                Some(found) => found,
                None => {
                    batches.push(DrawBatch::open(
                        pass,
                        buffer_index,
                        &buffers[buffer_index],
                        face,
                        multiplexing,
                    ));
                    current = Some(batches.len() - 1);
                    (batches.len() - 1, 0)
                }
            };

            buffers[buffer_index].append(face, texture_index);
            batches[batch_index].push(face, texture_index);

            stats.faces_batched += 1;
            stats.vertices += vertices;
            stats.indices += face.face.index_count();
        }

        stats.buffers = buffers.len();
        stats.batches = batches.len();
        BatchOutput {
            buffers,
            batches,
            stats,
        }
    }
}
