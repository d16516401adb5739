//! Bounds aggregation for faces, objects and spatial groups.
//!
//! Object bounds fold the per-face boxes (O(faces), never O(vertices)) and
//! transform the result to world space. Group bounds fold member objects and
//! child groups recursively. Both are recomputed only when something below
//! them moved; otherwise the cached value is returned.

use log::trace;

use crate::math::BoundingBox;
use crate::pipeline::collaborators::SpatialPartition;
use crate::resources::shape::VolumeFace;
use crate::scene::group::SpatialGroupBounds;
use crate::scene::object::{DirtyFlags, ObjectClass, VolumeObject};
use crate::scene::{GroupKey, ObjectKey, VolumeScene};
use crate::settings::BinRadiusSettings;

/// Component-wise min/max over the face boxes, plus the center.
#[must_use]
pub fn aggregate(faces: &[VolumeFace]) -> SpatialGroupBounds {
    SpatialGroupBounds::from_box(&aggregate_boxes(faces.iter().map(|f| &f.bounds)))
}

#[must_use]
pub fn aggregate_boxes<'a, I>(boxes: I) -> BoundingBox
where
    I: IntoIterator<Item = &'a BoundingBox>,
{
    let mut out = BoundingBox::EMPTY;
    for b in boxes {
        out.extend(b);
    }
    out
}

/// Radius used to pick the object's partition bin.
///
/// Translucent (non-maskable) objects wrap their smallest scale axis,
/// animating objects wrap their extents, static objects and attachments use
/// an integer size class, dynamic objects their raw radius. Distance terms
/// apply as `r * (1 + d * f[1]) + d * f[0]`. The result is clamped to
/// `[min_radius, max_radius]`.
#[must_use]
pub fn bin_radius(object: &VolumeObject, distance: f32, settings: &BinRadiusSettings) -> f32 {
    let alpha_wrap = object.materials().iter().any(|m| {
        m.is_translucent() && !m.can_render_as_mask() && !m.texture.is_some_and(|t| t.is_alpha_only())
    });
    let size_class =
        |radius: f32, factor: u32| (radius as i32).max(1) as f32 * factor.max(1) as f32;
    let distance_scaled =
        |radius: f32, f: [f32; 2]| radius * (1.0 + distance * f[1]) + distance * f[0];

    let radius = if alpha_wrap {
        let scale = object.scale;
        distance_scaled(scale.min_element() * 0.5, settings.alpha_distance_factor)
    } else if object.is_animating() && !object.world_bounds().is_empty() {
        object.world_bounds().size().length() * 0.5
    } else {
        match object.class() {
            ObjectClass::Static => distance_scaled(
                size_class(object.radius(), settings.static_size_factor),
                settings.distance_factor,
            ),
            ObjectClass::Attachment => size_class(object.radius(), settings.attachment_size_factor),
            ObjectClass::Dynamic => distance_scaled(object.radius(), settings.distance_factor),
        }
    };

    if radius.is_nan() {
        return settings.min_radius;
    }
    radius.clamp(settings.min_radius, settings.max_radius)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoundsAggregator;

impl BoundsAggregator {
    /// Recomputes the object's local and world bounds if its geometry moved.
    ///
    /// Returns `false` (bounds untouched) when no geometry flag is set.
    pub fn update_object(object: &mut VolumeObject) -> bool {
        if !object.dirty.intersects(DirtyFlags::GEOMETRY) {
            return false;
        }
        let local = aggregate_boxes(object.faces().iter().map(|f| &f.bounds));
        object.local_bounds = local;
        object.world_bounds = local.transform(&object.transform);
        true
    }

    /// Refreshes the bounds of `group` and its subtree, bottom-up.
    ///
    /// A group that is not flagged dirty returns its cached bounds; dirty
    /// flags are propagated to ancestors when set, so a clean group has a
    /// clean subtree. Fresh bounds are reported to the partition.
    pub fn update_group(
        scene: &mut VolumeScene,
        group: GroupKey,
        partition: &mut dyn SpatialPartition,
    ) -> SpatialGroupBounds {
        let children = match scene.groups.get(group) {
            Some(g) if !g.bounds_dirty => return g.bounds,
            Some(g) => g.children.clone(),
            None => return SpatialGroupBounds::EMPTY,
        };

        let mut bounds = BoundingBox::EMPTY;
        for child in children {
            let child_bounds = Self::update_group(scene, child, partition);
            if !child_bounds.is_empty() {
                bounds.extend(&child_bounds.to_box());
            }
        }

        let Some(g) = scene.groups.get_mut(group) else {
            return SpatialGroupBounds::EMPTY;
        };
        for key in &g.members {
            if let Some(object) = scene.objects.get(*key) {
                bounds.extend(object.world_bounds());
            }
        }
        g.bounds = SpatialGroupBounds::from_box(&bounds);
        g.bounds_dirty = false;
        trace!("Group {group:?} bounds {:?}..{:?}", g.bounds.min, g.bounds.max);
        partition.update_group_bounds(group, &g.bounds);
        g.bounds
    }

    /// Reports an object's world bounds to the partition.
    pub fn publish_object(
        key: ObjectKey,
        object: &VolumeObject,
        partition: &mut dyn SpatialPartition,
    ) {
        partition.update_object_bounds(key, &SpatialGroupBounds::from_box(object.world_bounds()));
    }
}
