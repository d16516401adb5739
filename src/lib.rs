#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! # Myth Volume
//!
//! CPU-side geometry preparation for volume objects (primitives and skinned
//! meshes): level-of-detail selection, skinning, face classification, draw
//! batching and bounds maintenance, run once per frame.
//!
//! ```rust,ignore
//! use myth_volume::prelude::*;
//!
//! let mut scene = VolumeScene::new();
//! scene.add_object(VolumeObject::new(ShapeParams::Sphere));
//!
//! let mut pipeline = VolumePipeline::default();
//! let ctx = RenderContext::new(1, Vec3::new(0.0, 0.0, 10.0), pipeline.settings());
//! let stats = pipeline.run_frame(&mut scene, &ctx, &mut services);
//! pipeline.submit(&scene, &mut rasterizer);
//! ```

pub mod errors;
pub mod math;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod settings;

pub use errors::{PipelineError, Result};
pub use math::BoundingBox;
pub use pipeline::{
    BatchBuilder, BoundsAggregator, DrawBatch, DrawInfoList, FrameServices, FrameStats,
    LodSelector, RenderContext, RenderPass, SkinDeformer, VolumePipeline, classify_face,
    select_lod,
};
pub use resources::{MaterialEntry, ShapeCache, ShapeParams, SkinBinding, VolumeFace, VolumeShape};
pub use scene::{ObjectKey, VolumeObject, VolumeScene};
pub use settings::PipelineSettings;

pub mod prelude {
    pub use crate::errors::{PipelineError, Result};
    pub use crate::math::BoundingBox;
    pub use crate::pipeline::{
        BatchMode, DefaultShaderTable, DrawBatch, FaceClass, FrameServices, FrameStats,
        PassFlags, Rasterizer, RenderContext, RenderPass, ShaderTable, SpatialPartition,
        TextureCache, VolumePipeline,
    };
    pub use crate::resources::{
        AlphaKind, MaterialEntry, MeshId, MeshSource, ShapeParams, Shininess, SkinBinding,
        TextureId, TextureInfo, VertexWeights, VolumeFace,
    };
    pub use crate::scene::{
        DirtyFlags, ObjectClass, ObjectKey, SkeletonId, SkeletonSource, TextureAnimation,
        VolumeObject, VolumeScene,
    };
    pub use crate::settings::PipelineSettings;
    pub use glam::{Mat4, Vec2, Vec3, Vec4};
}
