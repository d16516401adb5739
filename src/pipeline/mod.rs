//! The per-frame geometry pipeline.
//!
//! Stages, leaf-first:
//! - [`LodSelector`]: detail level from radius, distance and quality
//! - [`SkinDeformer`]: CPU skinning of inspected rigged attachments
//! - [`classify_face`]: material state to render pass
//! - [`BatchBuilder`]: faces to shared buffers and draw batches
//! - [`BoundsAggregator`]: face, object and group bounds
//! - [`DrawInfoList`]: per-pass batches handed to the rasterizer
//!
//! [`VolumePipeline`] drives them once per frame with a [`RenderContext`]
//! and the collaborators in [`FrameServices`].

pub mod batch;
pub mod bounds;
pub mod classify;
pub mod collaborators;
pub mod context;
pub mod deform;
pub mod draw_info;
pub mod frame;
pub mod lod;

pub use batch::{
    BatchBreakKey, BatchBuffer, BatchBuilder, BatchFace, BatchMember, BatchOutput, BatchStats,
    DrawBatch, FaceRef, NodeBudget,
};
pub use bounds::{BoundsAggregator, aggregate, aggregate_boxes, bin_radius};
pub use classify::{BatchMode, FaceClass, PassFlags, PassSet, RenderPass, classify_face};
pub use collaborators::{
    DefaultShaderTable, FrameServices, Rasterizer, ShaderTable, SpatialPartition, TextureCache,
};
pub use context::RenderContext;
pub use deform::{DeformOutcome, SkinDeformer};
pub use draw_info::DrawInfoList;
pub use frame::{FrameStats, VolumePipeline};
pub use lod::{LodDecision, LodSelector, apparent_angle, select_lod};
