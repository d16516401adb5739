//! CPU skinning of rigged faces.
//!
//! Each vertex blends up to four palette matrices linearly by its
//! renormalized weights, then transforms `bind_shape * rest` by the blend:
//!
//! ```text
//! p' = (Σ wᵢ · palette[jᵢ]) · bind_shape · p
//! ```
//!
//! Blending is a linear combination of affine matrices (no quaternion
//! interpolation). Bounds are recomputed from the deformed positions on every
//! run. Normals and texture coordinates are carried over from the rest face.
//!
//! Deformation only runs for rigged attachments that are being inspected;
//! everything else renders rest geometry and is skinned elsewhere.

use glam::Mat4;
use log::warn;

use crate::errors::{PipelineError, Result};
use crate::math::{BoundingBox, accumulate_weighted};
use crate::resources::shape::VolumeFace;
use crate::resources::skin::{MAX_INFLUENCES, SkinBinding};
use crate::scene::object::VolumeObject;
use crate::scene::skeleton::{MatrixPalette, PaletteCache, SkeletonSource};
use crate::settings::SkinSettings;

/// What happened to an object's geometry this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeformOutcome {
    /// Not a rigged attachment under inspection; rest geometry is used.
    PassThrough,
    /// Faces were deformed.
    Deformed { faces: usize },
    /// Marked skinned but the binding is gone; rest geometry is used.
    MissingBinding,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SkinDeformer {
    settings: SkinSettings,
}

impl SkinDeformer {
    #[must_use]
    pub fn new(settings: SkinSettings) -> Self {
        Self { settings }
    }

    /// Whether an object needs CPU-side deformed geometry.
    #[inline]
    #[must_use]
    pub fn is_required(object: &VolumeObject) -> bool {
        object.is_rigged_attachment() && object.is_inspected()
    }

    /// Blended skinning matrix for one vertex.
    ///
    /// Weights are renormalized by their sum. A sum at or below the weight
    /// epsilon leaves the vertex unskinned (identity blend).
    #[must_use]
    pub fn blend(
        &self,
        palette: &MatrixPalette,
        joints: &[u16; MAX_INFLUENCES],
        weights: &[f32; MAX_INFLUENCES],
    ) -> Mat4 {
        let sum: f32 = weights.iter().sum();
        if sum <= self.settings.weight_epsilon {
            return Mat4::IDENTITY;
        }
        let scale = 1.0 / sum;
        let mut blended = Mat4::ZERO;
        for k in 0..MAX_INFLUENCES {
            let w = weights[k] * scale;
            if w > 0.0 {
                accumulate_weighted(&mut blended, &palette.get(joints[k]), w);
            }
        }
        blended
    }

    /// Deforms one rest face under `palette`.
    ///
    /// Positions go through the binding's bind-shape matrix before blending,
    /// so "rest pose" here means `bind_shape * p`. Identity joint matrices
    /// reproduce the input positions only when the bind-shape matrix is the
    /// identity too.
    ///
    /// Fails with [`PipelineError::MissingBinding`] when the binding has no
    /// weights for the face or their count does not match its vertices.
    pub fn deform(
        &self,
        binding: &SkinBinding,
        palette: &MatrixPalette,
        rest: &VolumeFace,
    ) -> Result<VolumeFace> {
        let weights = binding.weights_for_face(rest.slot).ok_or_else(|| {
            PipelineError::MissingBinding(format!(
                "binding {} has no weights for face {}",
                binding.id, rest.slot
            ))
        })?;
        if weights.len() != rest.vertex_count() {
            return Err(PipelineError::MissingBinding(format!(
                "binding {} face {}: {} weights for {} vertices",
                binding.id,
                rest.slot,
                weights.len(),
                rest.vertex_count()
            )));
        }

        let bind_shape = binding.bind_shape_matrix;
        let mut bounds = BoundingBox::EMPTY;
        let positions = rest
            .positions
            .iter()
            .zip(weights)
            .map(|(&p, w)| {
                let blended = self.blend(palette, &w.joints, &w.weights);
                let deformed = blended.transform_point3(bind_shape.transform_point3(p));
                bounds.extend_point(deformed);
                deformed
            })
            .collect();

        Ok(VolumeFace {
            slot: rest.slot,
            positions,
            normals: rest.normals.clone(),
            uvs: rest.uvs.clone(),
            indices: rest.indices.clone(),
            bounds,
        })
    }

    /// Updates an object's deformed geometry for this frame.
    ///
    /// Falls back to rest geometry when deformation is not required or the
    /// binding is missing; the latter logs once per object. Faces the
    /// binding cannot skin keep their rest geometry.
    pub fn deform_object(
        &self,
        object: &mut VolumeObject,
        palettes: &mut PaletteCache,
        skeletons: &dyn SkeletonSource,
    ) -> DeformOutcome {
        if !Self::is_required(object) {
            object.deformed = None;
            return DeformOutcome::PassThrough;
        }

        let (Some(binding), Some(skeleton)) = (object.skin_binding(), object.skeleton()) else {
            object.deformed = None;
            if object.is_skinned() && !object.warned_missing_binding {
                warn!(
                    "Object '{}' is skinned but has no skin binding; rendering rest pose",
                    object.name
                );
                object.warned_missing_binding = true;
            }
            return DeformOutcome::MissingBinding;
        };

        let Some(shape) = object.shape().cloned() else {
            object.deformed = None;
            return DeformOutcome::PassThrough;
        };

        let palette = palettes.palette(skeleton, &binding, skeletons);
        let mut failed = 0usize;
        let faces: Vec<VolumeFace> = shape
            .faces
            .iter()
            .map(|rest| {
                self.deform(&binding, &palette, rest).unwrap_or_else(|_| {
                    failed += 1;
                    rest.clone()
                })
            })
            .collect();

        if failed > 0 && !object.warned_missing_binding {
            warn!(
                "Object '{}': skin binding {} does not cover {failed} face(s)",
                object.name, binding.id
            );
            object.warned_missing_binding = true;
        }

        let count = faces.len();
        object.deformed = Some(faces);
        DeformOutcome::Deformed { faces: count }
    }
}
