//! Procedural tessellation of the primitive [`ShapeParams`] variants.
//!
//! Every primitive is unit-sized and centered on the origin (Y-up); the
//! object's world transform carries scale. Density grows with the detail
//! level through [`DETAIL_SCALES`].

pub mod box_shape;
pub mod cylinder;
pub mod sphere;

pub use box_shape::create_box;
pub use cylinder::create_cylinder;
pub use sphere::{SphereOptions, create_sphere};

use crate::errors::Result;
use crate::resources::shape::{DETAIL_SCALES, MAX_LOD, ShapeParams, VolumeFace};

/// Density multiplier of `lod`, clamped to the finest level.
#[inline]
#[must_use]
pub fn detail_scale(lod: u8) -> f32 {
    DETAIL_SCALES[usize::from(lod.min(MAX_LOD))]
}

/// Tessellates a primitive definition at `lod`.
///
/// Returns an empty list for [`ShapeParams::Mesh`], whose faces come from the
/// mesh repository instead.
pub fn tessellate(params: &ShapeParams, lod: u8) -> Result<Vec<VolumeFace>> {
    let scale = detail_scale(lod);
    match *params {
        ShapeParams::Box => create_box(scale),
        ShapeParams::Sphere => {
            let width_segments = (8.0 * scale).round() as u32;
            create_sphere(&SphereOptions {
                radius: 0.5,
                width_segments,
                height_segments: width_segments / 2,
            })
            .map(|face| vec![face])
        }
        ShapeParams::Cylinder { top_scale } => {
            create_cylinder((8.0 * scale).round() as u32, top_scale)
        }
        ShapeParams::Mesh(_) => Ok(Vec::new()),
    }
}
