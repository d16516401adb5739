//! Level-of-detail selection.
//!
//! # Dynamic LOD
//!
//! The camera distance is scaled by the global distance factor, ramped
//! quadratically below `ramp_distance` so point-blank objects gain detail
//! smoothly, then multiplied by a fixed field-of-view compensation. Distance
//! and radius are rounded to hundredths, and the apparent size
//! `tan = quality * radius / distance` (also rounded) is looked up in the
//! ascending threshold table.
//!
//! # Static LOD
//!
//! Without dynamic LOD the level depends on size alone:
//! `clamp(floor(sqrt(radius) * quality * 4), 0, 3)`.
//!
//! Both paths are non-increasing in distance; rounding only ever merges
//! neighbouring inputs onto the same level.

use glam::Vec3;

use crate::math::round_to;
use crate::pipeline::bounds::bin_radius;
use crate::resources::shape::MAX_LOD;
use crate::scene::object::{DirtyFlags, VolumeObject};
use crate::settings::{BinRadiusSettings, LodSettings};

/// Floor applied to the effective distance before dividing by it.
const MIN_DISTANCE: f32 = 1e-3;

/// Outcome of one LOD evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodDecision {
    pub lod: u8,
    /// Rounded apparent size used for the lookup (0 on the static path).
    pub tan_angle: f32,
    /// Distance after factor, ramp, compensation and rounding.
    pub effective_distance: f32,
}

/// Selects a detail level with default settings and the given quality factor.
#[must_use]
pub fn select_lod(radius: f32, distance: f32, quality: f32, dynamic_lod: bool) -> u8 {
    let settings = LodSettings {
        dynamic_lod,
        lod_factor: quality,
        ..LodSettings::default()
    };
    LodSelector::new(settings).select(radius, distance)
}

#[derive(Debug, Clone, Default)]
pub struct LodSelector {
    settings: LodSettings,
}

impl LodSelector {
    #[must_use]
    pub fn new(settings: LodSettings) -> Self {
        Self { settings }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &LodSettings {
        &self.settings
    }

    /// Camera distance as seen by the threshold table.
    #[must_use]
    pub fn effective_distance(&self, distance: f32) -> f32 {
        let mut d = distance.max(0.0) * self.settings.distance_factor;
        let ramp = self.settings.ramp_distance();
        if d < ramp {
            d *= d / ramp;
        }
        round_to(d * self.settings.fov_compensation, 0.01)
    }

    /// Detail level of a rounded apparent size.
    #[must_use]
    pub fn level_for_tan(&self, tan_angle: f32) -> u8 {
        self.settings
            .detail_thresholds
            .iter()
            .position(|&threshold| tan_angle <= threshold)
            .map_or(MAX_LOD, |level| level as u8)
    }

    #[must_use]
    pub fn evaluate(&self, radius: f32, distance: f32) -> LodDecision {
        let effective_distance = self.effective_distance(distance);
        let radius = round_to(radius.max(0.0), 0.01);

        if !self.settings.dynamic_lod {
            let level = (radius.sqrt() * self.settings.lod_factor * 4.0).floor();
            return LodDecision {
                lod: level.clamp(0.0, f32::from(MAX_LOD)) as u8,
                tan_angle: 0.0,
                effective_distance,
            };
        }

        let tan_angle = round_to(
            self.settings.lod_factor * radius / effective_distance.max(MIN_DISTANCE),
            0.01,
        );
        LodDecision {
            lod: self.level_for_tan(tan_angle),
            tan_angle,
            effective_distance,
        }
    }

    #[inline]
    #[must_use]
    pub fn select(&self, radius: f32, distance: f32) -> u8 {
        self.evaluate(radius, distance).lod
    }

    /// Re-evaluates an object's level against the camera.
    ///
    /// Returns `true` only when the level differs from the cached one, in
    /// which case the object's shape is marked dirty. A repeated call with
    /// the same inputs returns `false`. When the level holds but the bin
    /// radius moved outside the repartition tolerance, the object is flagged
    /// for a partition move instead.
    pub fn update_object(
        &self,
        object: &mut VolumeObject,
        camera_position: Vec3,
        bin_settings: &BinRadiusSettings,
    ) -> bool {
        let distance = camera_position.distance(object.center());
        let decision = self.evaluate(object.lod_radius(), distance);
        object.app_angle = apparent_angle(object.radius(), distance);

        let new_bin_radius = bin_radius(object, distance, bin_settings);
        if decision.lod != object.lod {
            object.lod = decision.lod;
            object.bin_radius = new_bin_radius;
            object.dirty |= DirtyFlags::SHAPE;
            return true;
        }

        let old = object.bin_radius;
        let tolerance = bin_settings.repartition_tolerance;
        if new_bin_radius < old * (1.0 - tolerance) || new_bin_radius > old * (1.0 + tolerance) {
            object.bin_radius = new_bin_radius;
            object.dirty |= DirtyFlags::PARTITION;
        }
        false
    }
}

/// Angular radius in degrees, rounded to hundredths.
#[must_use]
pub fn apparent_angle(radius: f32, distance: f32) -> f32 {
    round_to(radius.atan2(distance).to_degrees(), 0.01)
}
