//! Scene data the pipeline operates on.
//!
//! - Object: volume objects with their dirty state and cached per-frame results
//! - Group: spatial groups owning bounds and per-pass draw info
//! - Scene: the arena holding objects and groups
//! - Skeleton: skeleton collaborator and per-frame matrix palettes
//!
//! Objects and groups live in `SlotMap`s. Everything that refers to them
//! (group membership, batch face references) stores generation-checked keys,
//! never references.

pub mod group;
pub mod object;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod skeleton;

pub use group::{SpatialGroup, SpatialGroupBounds};
pub use object::{DirtyFlags, ObjectClass, TextureAnimation, VolumeObject};
pub use scene::VolumeScene;
pub use skeleton::{MatrixPalette, PaletteCache, SkeletonId, SkeletonSource};

use slotmap::new_key_type;

new_key_type! {
    pub struct ObjectKey;
    pub struct GroupKey;
}
