//! Small fixed-size math helpers on top of `glam`.
//!
//! # Conventions
//!
//! Matrices are column-major and transform column vectors (`M * v`), as glam
//! does. Skinning matrices are affine: the bottom row is assumed to be
//! `(0, 0, 0, 1)` and points are transformed without a homogeneous divide.
//! Palettes are stored as contiguous `Vec<Mat4>` and can be uploaded as-is;
//! per-vertex skin data is explicitly 16-byte aligned.

pub mod bounds;

pub use bounds::BoundingBox;

use glam::Mat4;

/// Accumulates `weight * m` into `acc`, treating all four columns linearly.
///
/// Linear blending of affine matrices keeps the result affine as long as the
/// weights sum to one.
#[inline]
pub fn accumulate_weighted(acc: &mut Mat4, m: &Mat4, weight: f32) {
    acc.x_axis += m.x_axis * weight;
    acc.y_axis += m.y_axis * weight;
    acc.z_axis += m.z_axis * weight;
    acc.w_axis += m.w_axis * weight;
}

/// Rounds `value` to the nearest multiple of `nearest`.
#[inline]
#[must_use]
pub fn round_to(value: f32, nearest: f32) -> f32 {
    (value / nearest).round() * nearest
}
