use std::sync::Arc;

use glam::Mat4;
use log::debug;
use rustc_hash::FxHashMap;

use crate::resources::skin::SkinBinding;

/// Identity of an animated skeleton (one avatar, one pose per frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkeletonId(pub u64);

/// Current joint transforms, owned by the animation system.
pub trait SkeletonSource {
    /// World matrix of `joint` in `skeleton`, or `None` if the skeleton has
    /// no such joint.
    fn joint_world_matrix(&self, skeleton: SkeletonId, joint: &str) -> Option<Mat4>;
}

impl SkeletonSource for () {
    fn joint_world_matrix(&self, _skeleton: SkeletonId, _joint: &str) -> Option<Mat4> {
        None
    }
}

/// Per-joint skinning matrices for one binding under one pose.
///
/// Entry `j` is `joint_world[j] * inverse_bind[j]`: it maps a bind-space
/// vertex into the joint's current world placement. Joints the skeleton does
/// not know contribute the identity.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixPalette {
    matrices: Vec<Mat4>,
    missing: usize,
}

impl MatrixPalette {
    #[must_use]
    pub fn identity(joint_count: usize) -> Self {
        Self {
            matrices: vec![Mat4::IDENTITY; joint_count],
            missing: 0,
        }
    }

    #[must_use]
    pub fn from_matrices(matrices: Vec<Mat4>) -> Self {
        Self {
            matrices,
            missing: 0,
        }
    }

    /// Resolves every joint of `binding` against the current pose.
    pub fn build(binding: &SkinBinding, skeleton: SkeletonId, source: &dyn SkeletonSource) -> Self {
        let mut missing = 0;
        let matrices = binding
            .joint_names
            .iter()
            .zip(&binding.inverse_bind_matrices)
            .map(|(name, inverse_bind)| match source.joint_world_matrix(skeleton, name) {
                Some(world) => world * *inverse_bind,
                None => {
                    missing += 1;
                    Mat4::IDENTITY
                }
            })
            .collect();
        if missing > 0 {
            debug!(
                "Skin binding {}: {missing} joint(s) not found in skeleton {skeleton:?}",
                binding.id
            );
        }
        Self { matrices, missing }
    }

    /// Matrix of `joint`; out-of-range indices give the identity.
    #[inline]
    #[must_use]
    pub fn get(&self, joint: u16) -> Mat4 {
        self.matrices
            .get(usize::from(joint))
            .copied()
            .unwrap_or(Mat4::IDENTITY)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Joints that resolved to the identity because the skeleton lacked them.
    #[inline]
    #[must_use]
    pub fn missing_joints(&self) -> usize {
        self.missing
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Mat4] {
        &self.matrices
    }

    /// Column-major matrix data, ready for upload to a joint buffer.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.matrices)
    }
}

/// Palettes of the current frame, keyed by `(skeleton, binding)`.
///
/// Every rigged object sharing a skeleton and binding reads the same
/// `Arc<MatrixPalette>`; each palette is built at most once per frame.
#[derive(Default)]
pub struct PaletteCache {
    frame: u64,
    palettes: FxHashMap<(SkeletonId, u64), Arc<MatrixPalette>>,
    builds: usize,
}

impl PaletteCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `frame`. Palettes built for an earlier frame are discarded.
    pub fn begin_frame(&mut self, frame: u64) {
        if frame != self.frame {
            self.frame = frame;
            self.palettes.clear();
            self.builds = 0;
        }
    }

    pub fn palette(
        &mut self,
        skeleton: SkeletonId,
        binding: &SkinBinding,
        source: &dyn SkeletonSource,
    ) -> Arc<MatrixPalette> {
        let builds = &mut self.builds;
        let palette = self
            .palettes
            .entry((skeleton, binding.id))
            .or_insert_with(|| {
                *builds += 1;
                Arc::new(MatrixPalette::build(binding, skeleton, source))
            });
        Arc::clone(palette)
    }

    /// Palettes built since the current frame began.
    #[inline]
    #[must_use]
    pub fn builds_this_frame(&self) -> usize {
        self.builds
    }

    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}
