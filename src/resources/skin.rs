//! Skin bindings for rigged meshes.
//!
//! A [`SkinBinding`] is owned by the mesh asset (`Arc`) and only weakly
//! referenced by the objects that render it.

use glam::{Mat4, Vec4};

use crate::errors::{PipelineError, Result};

/// Number of joint influences per vertex.
pub const MAX_INFLUENCES: usize = 4;

/// Up to four `(joint, weight)` influences of one vertex.
///
/// Weights are expected to sum to one but are renormalized at skinning time.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VertexWeights {
    pub weights: [f32; MAX_INFLUENCES],
    pub joints: [u16; MAX_INFLUENCES],
}

impl VertexWeights {
    /// A vertex fully bound to `joint`.
    #[must_use]
    pub fn single(joint: u16) -> Self {
        Self {
            weights: [1.0, 0.0, 0.0, 0.0],
            joints: [joint, 0, 0, 0],
        }
    }

    #[must_use]
    pub fn new(influences: &[(u16, f32)]) -> Self {
        let mut out = Self::default();
        for (k, &(joint, weight)) in influences.iter().take(MAX_INFLUENCES).enumerate() {
            out.joints[k] = joint;
            out.weights[k] = weight;
        }
        out
    }

    /// Decodes the packed format where each component stores the joint
    /// index in its integer part and the weight in its fractional part.
    #[must_use]
    pub fn from_packed(packed: Vec4) -> Self {
        let mut out = Self::default();
        for k in 0..MAX_INFLUENCES {
            let w = packed[k].max(0.0);
            let joint = w.floor();
            out.joints[k] = joint as u16;
            out.weights[k] = w - joint;
        }
        out
    }

    #[inline]
    #[must_use]
    pub fn sum(&self) -> f32 {
        self.weights.iter().sum()
    }
}

/// Per-vertex joint weights of a rigged mesh plus its bind pose.
#[derive(Debug, Clone)]
pub struct SkinBinding {
    /// Stable identity used to share palettes between objects.
    pub id: u64,
    pub joint_names: Vec<String>,
    /// One per joint, transforms mesh space into the joint's local space.
    pub inverse_bind_matrices: Vec<Mat4>,
    /// Applied to rest positions before joint blending.
    pub bind_shape_matrix: Mat4,
    /// Vertex weights per face slot.
    face_weights: Vec<Vec<VertexWeights>>,
}

impl SkinBinding {
    pub fn new(
        id: u64,
        joint_names: Vec<String>,
        inverse_bind_matrices: Vec<Mat4>,
        bind_shape_matrix: Mat4,
        face_weights: Vec<Vec<VertexWeights>>,
    ) -> Result<Self> {
        if joint_names.len() != inverse_bind_matrices.len() {
            return Err(PipelineError::MissingBinding(format!(
                "binding {id}: {} joint names but {} inverse bind matrices",
                joint_names.len(),
                inverse_bind_matrices.len()
            )));
        }
        Ok(Self {
            id,
            joint_names,
            inverse_bind_matrices,
            bind_shape_matrix,
            face_weights,
        })
    }

    #[inline]
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joint_names.len()
    }

    /// Weights of face slot `slot`, if the binding covers it.
    #[inline]
    #[must_use]
    pub fn weights_for_face(&self, slot: usize) -> Option<&[VertexWeights]> {
        self.face_weights.get(slot).map(Vec::as_slice)
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.face_weights.len()
    }
}
