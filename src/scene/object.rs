//! Volume objects.
//!
//! A [`VolumeObject`] is the per-instance state the pipeline reads and
//! caches results on: shape reference, world transform, one material entry
//! per face slot and an optional weak skin binding. Mutators set
//! [`DirtyFlags`]; the frame driver consumes them.

use std::sync::{Arc, Weak};

use bitflags::bitflags;
use glam::{Affine3A, Quat, Vec3};

use crate::math::BoundingBox;
use crate::pipeline::classify::FaceClass;
use crate::resources::material::MaterialEntry;
use crate::resources::shape::{ShapeParams, UNRESOLVED_LOD, VolumeFace, VolumeShape};
use crate::resources::skin::SkinBinding;
use crate::scene::GroupKey;
use crate::scene::skeleton::SkeletonId;

bitflags! {
    /// What changed on an object since the pipeline last processed it.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFlags: u8 {
        /// Tessellation must be (re)resolved.
        const SHAPE     = 1 << 0;
        const TRANSFORM = 1 << 1;
        const MATERIAL  = 1 << 2;
        /// Skin binding, pose or inspection state changed.
        const SKIN      = 1 << 3;
        /// Bin radius drifted; the partition should re-file the object.
        const PARTITION = 1 << 4;
    }
}

impl DirtyFlags {
    /// Changes that move vertex positions.
    pub const GEOMETRY: Self = Self::SHAPE.union(Self::TRANSFORM).union(Self::SKIN);
}

/// Movement class, used to pick a bin-radius formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectClass {
    #[default]
    Static,
    Dynamic,
    Attachment,
}

/// Which faces have a private, animating texture-coordinate matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureAnimation {
    #[default]
    None,
    Face(usize),
    AllFaces,
}

impl TextureAnimation {
    #[inline]
    #[must_use]
    pub fn affects(&self, slot: usize) -> bool {
        match *self {
            Self::None => false,
            Self::Face(face) => face == slot,
            Self::AllFaces => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolumeObject {
    pub name: String,
    pub(crate) params: ShapeParams,
    pub(crate) shape: Option<Arc<VolumeShape>>,
    pub(crate) transform: Affine3A,
    pub(crate) scale: Vec3,
    pub(crate) materials: Vec<MaterialEntry>,

    // === Skinning ===
    pub(crate) skin: Option<Weak<SkinBinding>>,
    pub(crate) skeleton: Option<SkeletonId>,
    /// The mesh is authored as skinned; a missing binding is then an error.
    pub(crate) skinned: bool,
    pub(crate) rigged_attachment: bool,
    pub(crate) inspected: bool,
    pub(crate) warned_missing_binding: bool,

    // === Classification inputs ===
    pub(crate) class: ObjectClass,
    pub(crate) animating: bool,
    pub(crate) texture_animation: TextureAnimation,

    // === Pipeline state ===
    pub(crate) dirty: DirtyFlags,
    pub(crate) generation: u32,
    pub(crate) lod: u8,
    pub(crate) app_angle: f32,
    pub(crate) bin_radius: f32,
    pub(crate) deformed: Option<Vec<VolumeFace>>,
    pub(crate) face_classes: Vec<FaceClass>,
    pub(crate) local_bounds: BoundingBox,
    pub(crate) world_bounds: BoundingBox,
    pub(crate) group: Option<GroupKey>,
}

impl VolumeObject {
    #[must_use]
    pub fn new(params: ShapeParams) -> Self {
        let face_count = params.primitive_face_count().unwrap_or(1);
        Self {
            name: String::new(),
            params,
            shape: None,
            transform: Affine3A::IDENTITY,
            scale: Vec3::ONE,
            materials: vec![MaterialEntry::default(); face_count],
            skin: None,
            skeleton: None,
            skinned: false,
            rigged_attachment: false,
            inspected: false,
            warned_missing_binding: false,
            class: ObjectClass::Static,
            animating: false,
            texture_animation: TextureAnimation::None,
            dirty: DirtyFlags::all() - DirtyFlags::PARTITION,
            generation: 0,
            lod: UNRESOLVED_LOD,
            app_angle: 0.0,
            bin_radius: 0.0,
            deformed: None,
            face_classes: Vec::new(),
            local_bounds: BoundingBox::EMPTY,
            world_bounds: BoundingBox::EMPTY,
            group: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: ObjectClass) -> Self {
        self.class = class;
        self
    }

    #[must_use]
    pub fn with_transform(mut self, translation: Vec3, scale: Vec3) -> Self {
        self.set_transform(translation, scale);
        self
    }

    #[must_use]
    pub fn with_materials(mut self, materials: Vec<MaterialEntry>) -> Self {
        self.set_materials(materials);
        self
    }

    // ========================================================================
    // Mutators
    // ========================================================================

    pub fn set_transform(&mut self, translation: Vec3, scale: Vec3) {
        self.transform = Affine3A::from_scale_rotation_translation(scale, Quat::IDENTITY, translation);
        self.scale = scale;
        self.dirty |= DirtyFlags::TRANSFORM;
    }

    pub fn set_params(&mut self, params: ShapeParams) {
        if self.params != params {
            self.params = params;
            self.dirty |= DirtyFlags::SHAPE;
        }
    }

    pub fn set_materials(&mut self, materials: Vec<MaterialEntry>) {
        self.materials = materials;
        self.dirty |= DirtyFlags::MATERIAL;
    }

    /// Replaces the material of one face slot, growing the list if needed.
    pub fn set_material(&mut self, slot: usize, material: MaterialEntry) {
        if slot >= self.materials.len() {
            self.materials.resize(slot + 1, MaterialEntry::default());
        }
        if self.materials[slot] != material {
            self.materials[slot] = material;
            self.dirty |= DirtyFlags::MATERIAL;
        }
    }

    /// Marks the mesh as skinned and attaches its binding (weakly).
    pub fn set_skin(&mut self, binding: &Arc<SkinBinding>, skeleton: SkeletonId) {
        self.skin = Some(Arc::downgrade(binding));
        self.skeleton = Some(skeleton);
        self.skinned = true;
        self.warned_missing_binding = false;
        self.dirty |= DirtyFlags::SKIN;
    }

    /// Marks the mesh as skinned without a binding yet (it may still be
    /// loading). Until one arrives the rest geometry is used.
    pub fn set_skinned(&mut self, skeleton: SkeletonId) {
        self.skeleton = Some(skeleton);
        self.skinned = true;
        self.dirty |= DirtyFlags::SKIN;
    }

    pub fn set_rigged_attachment(&mut self, rigged: bool) {
        if self.rigged_attachment != rigged {
            self.rigged_attachment = rigged;
            if rigged {
                self.class = ObjectClass::Attachment;
            }
            self.dirty |= DirtyFlags::SKIN;
        }
    }

    /// Editing or inspecting the object needs CPU-side deformed geometry.
    pub fn set_inspected(&mut self, inspected: bool) {
        if self.inspected != inspected {
            self.inspected = inspected;
            self.dirty |= DirtyFlags::SKIN;
        }
    }

    pub fn set_animating(&mut self, animating: bool) {
        self.animating = animating;
    }

    pub fn set_texture_animation(&mut self, animation: TextureAnimation) {
        if self.texture_animation != animation {
            self.texture_animation = animation;
            self.dirty |= DirtyFlags::MATERIAL;
        }
    }

    #[inline]
    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty |= flags;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn params(&self) -> &ShapeParams {
        &self.params
    }

    #[inline]
    #[must_use]
    pub fn shape(&self) -> Option<&Arc<VolumeShape>> {
        self.shape.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Affine3A {
        &self.transform
    }

    #[inline]
    #[must_use]
    pub fn materials(&self) -> &[MaterialEntry] {
        &self.materials
    }

    /// Material of a face slot; slots past the list use the default entry.
    #[must_use]
    pub fn material(&self, slot: usize) -> MaterialEntry {
        self.materials.get(slot).cloned().unwrap_or_default()
    }

    #[inline]
    #[must_use]
    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Bumped whenever the object's face geometry, order or materials change.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Cached detail level, or [`UNRESOLVED_LOD`] before the first frame.
    #[inline]
    #[must_use]
    pub fn lod(&self) -> u8 {
        self.lod
    }

    /// Apparent angular size in degrees from the last LOD evaluation.
    #[inline]
    #[must_use]
    pub fn app_angle(&self) -> f32 {
        self.app_angle
    }

    #[inline]
    #[must_use]
    pub fn bin_radius(&self) -> f32 {
        self.bin_radius
    }

    #[inline]
    #[must_use]
    pub fn class(&self) -> ObjectClass {
        self.class
    }

    #[inline]
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animating
    }

    #[inline]
    #[must_use]
    pub fn texture_animation(&self) -> TextureAnimation {
        self.texture_animation
    }

    #[inline]
    #[must_use]
    pub fn is_rigged_attachment(&self) -> bool {
        self.rigged_attachment
    }

    #[inline]
    #[must_use]
    pub fn is_inspected(&self) -> bool {
        self.inspected
    }

    #[inline]
    #[must_use]
    pub fn is_skinned(&self) -> bool {
        self.skinned
    }

    #[inline]
    #[must_use]
    pub fn skeleton(&self) -> Option<SkeletonId> {
        self.skeleton
    }

    /// Strong handle to the binding, if the mesh asset still holds it.
    #[must_use]
    pub fn skin_binding(&self) -> Option<Arc<SkinBinding>> {
        self.skin.as_ref().and_then(Weak::upgrade)
    }

    #[inline]
    #[must_use]
    pub fn is_deformed(&self) -> bool {
        self.deformed.is_some()
    }

    /// Faces to render: deformed geometry when skinning ran, rest geometry
    /// otherwise.
    #[must_use]
    pub fn faces(&self) -> &[VolumeFace] {
        if let Some(deformed) = &self.deformed {
            return deformed;
        }
        self.shape.as_ref().map_or(&[], |shape| shape.faces.as_slice())
    }

    #[inline]
    #[must_use]
    pub fn face_classes(&self) -> &[FaceClass] {
        &self.face_classes
    }

    #[inline]
    #[must_use]
    pub fn local_bounds(&self) -> &BoundingBox {
        &self.local_bounds
    }

    #[inline]
    #[must_use]
    pub fn world_bounds(&self) -> &BoundingBox {
        &self.world_bounds
    }

    /// Radius used by the LOD selector.
    #[inline]
    #[must_use]
    pub fn lod_radius(&self) -> f32 {
        self.params.lod_radius(self.scale)
    }

    /// Radius of the world bounds, or the LOD radius before bounds exist.
    #[must_use]
    pub fn radius(&self) -> f32 {
        if self.world_bounds.is_empty() {
            self.lod_radius()
        } else {
            self.world_bounds.radius()
        }
    }

    /// World-space center: bounds center when known, else the translation.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        if self.world_bounds.is_empty() {
            self.transform.translation.into()
        } else {
            self.world_bounds.center()
        }
    }

    #[inline]
    #[must_use]
    pub fn group(&self) -> Option<GroupKey> {
        self.group
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}
