//! Interfaces to the systems around the pipeline.
//!
//! The pipeline only calls into these; it never owns their state. Every
//! trait has a no-op implementation on `()` for callers that do not need it.

use crate::pipeline::batch::DrawBatch;
use crate::pipeline::classify::RenderPass;
use crate::resources::material::TextureId;
use crate::resources::shape::MeshSource;
use crate::resources::vertex::AttributeMask;
use crate::scene::skeleton::SkeletonSource;
use crate::scene::{GroupKey, ObjectKey, SpatialGroupBounds};

/// Texture streaming cache. Fire-and-forget usage hints.
pub trait TextureCache {
    /// `priority` grows with on-screen size; `size_hint` is the vertex count
    /// the texture is drawn over.
    fn notify_usage(&mut self, texture: TextureId, priority: f32, size_hint: u32);
}

/// Shader program table.
pub trait ShaderTable {
    /// Vertex channels the pass's shader consumes.
    fn attribute_mask(&self, pass: RenderPass) -> AttributeMask;
}

/// Culling structure fed with fresh bounds.
pub trait SpatialPartition {
    fn update_object_bounds(&mut self, object: ObjectKey, bounds: &SpatialGroupBounds);

    fn update_group_bounds(&mut self, _group: GroupKey, _bounds: &SpatialGroupBounds) {}

    /// The object's bin radius drifted enough to re-file it.
    fn mark_partition_move(&mut self, _object: ObjectKey, _bin_radius: f32) {}
}

/// Single consumer of the finished draw lists.
pub trait Rasterizer {
    fn draw_pass(&mut self, pass: RenderPass, batches: &[DrawBatch]);
}

impl TextureCache for () {
    fn notify_usage(&mut self, _texture: TextureId, _priority: f32, _size_hint: u32) {}
}

impl SpatialPartition for () {
    fn update_object_bounds(&mut self, _object: ObjectKey, _bounds: &SpatialGroupBounds) {}
}

impl Rasterizer for () {
    fn draw_pass(&mut self, _pass: RenderPass, _batches: &[DrawBatch]) {}
}

/// Attribute masks of the stock shaders.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultShaderTable;

impl ShaderTable for DefaultShaderTable {
    fn attribute_mask(&self, pass: RenderPass) -> AttributeMask {
        match pass {
            RenderPass::Bump => AttributeMask::BUMP,
            RenderPass::Fullbright
            | RenderPass::FullbrightShiny
            | RenderPass::FullbrightAlphaMask
            | RenderPass::Glow => AttributeMask::FULLBRIGHT,
            RenderPass::Invisible => AttributeMask::POSITION,
            RenderPass::Simple
            | RenderPass::Shiny
            | RenderPass::AlphaMask
            | RenderPass::Alpha => AttributeMask::SIMPLE,
        }
    }
}

/// Collaborators of one frame, borrowed for its duration.
pub struct FrameServices<'a> {
    pub meshes: &'a dyn MeshSource,
    pub skeletons: &'a dyn SkeletonSource,
    pub shaders: &'a dyn ShaderTable,
    pub textures: &'a mut dyn TextureCache,
    pub partition: &'a mut dyn SpatialPartition,
}
