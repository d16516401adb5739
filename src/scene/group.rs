use glam::Vec3;
use smallvec::SmallVec;

use crate::math::BoundingBox;
use crate::pipeline::classify::PassSet;
use crate::pipeline::draw_info::DrawInfoList;
use crate::scene::{GroupKey, ObjectKey};

/// Axis-aligned bounds of a partition node, with its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialGroupBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
}

impl SpatialGroupBounds {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
        center: Vec3::ZERO,
    };

    #[must_use]
    pub fn from_box(bounds: &BoundingBox) -> Self {
        if bounds.is_empty() {
            return Self::EMPTY;
        }
        Self {
            min: bounds.min,
            max: bounds.max,
            center: bounds.center(),
        }
    }

    #[inline]
    #[must_use]
    pub fn to_box(&self) -> BoundingBox {
        BoundingBox::new(self.min, self.max)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_box().is_empty()
    }
}

impl Default for SpatialGroupBounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// A node of the spatial hierarchy.
///
/// Owns the draw info of its member objects' faces. Only the bounds
/// aggregator writes `bounds`; only the frame driver and scene removal touch
/// `draw_info`.
#[derive(Debug, Default)]
pub struct SpatialGroup {
    pub(crate) parent: Option<GroupKey>,
    pub(crate) children: SmallVec<[GroupKey; 8]>,
    pub(crate) members: Vec<ObjectKey>,
    pub(crate) bounds: SpatialGroupBounds,
    pub(crate) draw_info: DrawInfoList,
    /// Passes whose face membership or geometry changed since the last build.
    pub(crate) dirty_passes: PassSet,
    pub(crate) bounds_dirty: bool,
    /// Camera position the Alpha pass was last sorted from.
    pub(crate) alpha_view: Option<Vec3>,
}

impl SpatialGroup {
    #[must_use]
    pub fn new(parent: Option<GroupKey>) -> Self {
        Self {
            parent,
            bounds_dirty: true,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<GroupKey> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[GroupKey] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn members(&self) -> &[ObjectKey] {
        &self.members
    }

    #[inline]
    #[must_use]
    pub fn bounds(&self) -> &SpatialGroupBounds {
        &self.bounds
    }

    #[inline]
    #[must_use]
    pub fn draw_info(&self) -> &DrawInfoList {
        &self.draw_info
    }

    #[inline]
    #[must_use]
    pub fn dirty_passes(&self) -> PassSet {
        self.dirty_passes
    }

    #[inline]
    pub fn mark_passes_dirty(&mut self, passes: PassSet) {
        self.dirty_passes.extend(passes);
    }
}
