//! Core resource definitions.
//!
//! Plain data consumed by the pipeline, independent of any GPU backend:
//! - Shape: per-LOD tessellations and their faces
//! - Cache: content-addressed shape storage
//! - Material: per-face material entries and texture descriptors
//! - Skin: skin bindings and vertex weights
//! - Vertex: vertex channel masks and sizes

pub mod cache;
pub mod material;
pub mod primitives;
pub mod shape;
pub mod skin;
pub mod vertex;

pub use cache::{ShapeCache, shape_key};
pub use material::{AlphaKind, MaterialEntry, PixelFormat, Shininess, TextureId, TextureInfo};
pub use shape::{
    DETAIL_SCALES, LOD_COUNT, MAX_FACE_VERTICES, MAX_LOD, MeshId, MeshSource, ShapeKey,
    ShapeParams, UNRESOLVED_LOD, VolumeFace, VolumeShape,
};
pub use skin::{MAX_INFLUENCES, SkinBinding, VertexWeights};
pub use vertex::AttributeMask;
