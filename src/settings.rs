//! Pipeline Settings
//!
//! Tunables for every stage of the volume pipeline, grouped per stage.
//!
//! All structs implement [`Default`] with the values the renderer ships with
//! and derive serde traits with `#[serde(default)]`, so a settings file only
//! needs to name the fields it overrides.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_volume::settings::PipelineSettings;
//!
//! // Defaults
//! let settings = PipelineSettings::default();
//!
//! // Partial override from JSON
//! let settings = PipelineSettings::from_json_str(r#"{ "lod": { "lod_factor": 2.0 } }"#)?;
//! ```

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};

// ---------------------------------------------------------------------------
// LodSettings
// ---------------------------------------------------------------------------

/// Level-of-detail selection parameters.
///
/// | Field               | Description                                   | Default            |
/// |---------------------|-----------------------------------------------|--------------------|
/// | `dynamic_lod`       | Use the distance-based angular heuristic      | `true`             |
/// | `lod_factor`        | Global quality factor                         | `1.0`              |
/// | `distance_factor`   | Pre-scale applied to camera distance          | `1.0`              |
/// | `fov_compensation`  | Fixed field-of-view scale applied to distance | `π / 3`            |
/// | `detail_thresholds` | Upper `tan` bound of detail levels 0, 1, 2    | `[0.5, 1.0, 2.0]`  |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodSettings {
    pub dynamic_lod: bool,
    pub lod_factor: f32,
    pub distance_factor: f32,
    pub fov_compensation: f32,
    /// A rounded `tan_angle` at or below `detail_thresholds[i]` selects level `i`;
    /// anything above the last threshold selects the finest level.
    pub detail_thresholds: [f32; 3],
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            dynamic_lod: true,
            lod_factor: 1.0,
            distance_factor: 1.0,
            fov_compensation: PI / 3.0,
            detail_thresholds: [0.5, 1.0, 2.0],
        }
    }
}

impl LodSettings {
    /// Distance below which the effective distance is ramped quadratically.
    #[inline]
    #[must_use]
    pub fn ramp_distance(&self) -> f32 {
        self.lod_factor * 2.0
    }
}

// ---------------------------------------------------------------------------
// BatchSettings
// ---------------------------------------------------------------------------

/// Buffer sizing and texture multiplexing limits used by the batch builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Maximum size of one vertex buffer, in KiB.
    pub max_vbo_size_kb: u32,
    /// Maximum vertex data one spatial group may hold, in KiB.
    pub max_node_size_kb: u32,
    /// Absolute per-buffer vertex ceiling (16-bit indices).
    pub hard_vertex_limit: u32,
    /// Pack several textures into one batch through a per-vertex texture index.
    pub texture_multiplexing: bool,
    /// Texture channels the batched shaders can index. One is reserved.
    pub indexed_texture_channels: u32,
    /// User cap on the number of textures per batch.
    pub max_texture_index: u32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_vbo_size_kb: 512,
            max_node_size_kb: 8192,
            hard_vertex_limit: 65535,
            texture_multiplexing: true,
            indexed_texture_channels: 8,
            max_texture_index: 7,
        }
    }
}

impl BatchSettings {
    /// Number of distinct textures one batch may reference.
    #[must_use]
    pub fn texture_channel_budget(&self) -> usize {
        if !self.texture_multiplexing {
            return 1;
        }
        let channels = self.indexed_texture_channels.saturating_sub(1).max(1);
        channels.min(self.max_texture_index).max(1) as usize
    }

    /// Per-buffer vertex ceiling for a vertex of `vertex_size` bytes.
    #[must_use]
    pub fn max_vertices(&self, vertex_size: u32) -> u32 {
        let size = vertex_size.max(1);
        ((self.max_vbo_size_kb * 1024) / size).min(self.hard_vertex_limit)
    }
}

// ---------------------------------------------------------------------------
// BinRadiusSettings
// ---------------------------------------------------------------------------

/// Coefficients of the partition bin-radius formulas.
///
/// The numbers are tuning values, not derived quantities. `distance_factor`
/// and `alpha_distance_factor` are `[additive, multiplicative]` pairs applied
/// as `radius * (1 + d * f[1]) + d * f[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinRadiusSettings {
    pub static_size_factor: u32,
    pub attachment_size_factor: u32,
    pub distance_factor: [f32; 2],
    pub alpha_distance_factor: [f32; 2],
    pub min_radius: f32,
    pub max_radius: f32,
    /// Relative bin-radius change that triggers a partition move.
    pub repartition_tolerance: f32,
}

impl Default for BinRadiusSettings {
    fn default() -> Self {
        Self {
            static_size_factor: 4,
            attachment_size_factor: 4,
            distance_factor: [0.0, 0.0],
            alpha_distance_factor: [0.1, 0.0],
            min_radius: 0.5,
            max_radius: 256.0,
            repartition_tolerance: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// RenderToggles / SkinSettings
// ---------------------------------------------------------------------------

/// Global shading switches that influence face classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderToggles {
    pub bump_enabled: bool,
    pub glow_enabled: bool,
    pub alpha_mask_enabled: bool,
}

impl Default for RenderToggles {
    fn default() -> Self {
        Self {
            bump_enabled: true,
            glow_enabled: true,
            alpha_mask_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinSettings {
    /// Weight sums at or below this value leave the vertex unskinned.
    pub weight_epsilon: f32,
}

impl Default for SkinSettings {
    fn default() -> Self {
        Self {
            weight_epsilon: 1e-6,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineSettings
// ---------------------------------------------------------------------------

/// Top-level configuration of the volume pipeline.
///
/// Consumed by [`VolumePipeline::new`](crate::pipeline::VolumePipeline::new);
/// per-frame switches are copied into each
/// [`RenderContext`](crate::pipeline::RenderContext).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub lod: LodSettings,
    pub batch: BatchSettings,
    pub bin_radius: BinRadiusSettings,
    pub toggles: RenderToggles,
    pub skin: SkinSettings,
}

impl PipelineSettings {
    /// Parses settings from JSON and validates them.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.lod.lod_factor.is_finite() && self.lod.lod_factor > 0.0) {
            return Err(PipelineError::InvalidSettings(format!(
                "lod_factor must be positive, got {}",
                self.lod.lod_factor
            )));
        }
        if !(self.lod.distance_factor.is_finite() && self.lod.distance_factor > 0.0) {
            return Err(PipelineError::InvalidSettings(format!(
                "distance_factor must be positive, got {}",
                self.lod.distance_factor
            )));
        }
        let t = self.lod.detail_thresholds;
        if !(t[0] <= t[1] && t[1] <= t[2]) {
            return Err(PipelineError::InvalidSettings(format!(
                "detail_thresholds must be ascending, got {t:?}"
            )));
        }
        if self.batch.hard_vertex_limit == 0 || self.batch.hard_vertex_limit > 65535 {
            return Err(PipelineError::InvalidSettings(format!(
                "hard_vertex_limit must be in 1..=65535, got {}",
                self.batch.hard_vertex_limit
            )));
        }
        if self.batch.max_vbo_size_kb == 0 {
            return Err(PipelineError::InvalidSettings(
                "max_vbo_size_kb must be non-zero".to_string(),
            ));
        }
        let r = &self.bin_radius;
        if !(r.min_radius > 0.0 && r.min_radius <= r.max_radius) {
            return Err(PipelineError::InvalidSettings(format!(
                "bin radius range [{}, {}] is empty",
                r.min_radius, r.max_radius
            )));
        }
        Ok(())
    }
}
