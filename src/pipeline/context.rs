//! Per-frame render context.
//!
//! Everything a pipeline stage needs to know about the current frame is
//! carried in one [`RenderContext`] value, built once at the start of the
//! frame and passed by reference through every stage. Nothing in the
//! pipeline reads global state.

use glam::Vec3;

use crate::settings::{PipelineSettings, RenderToggles};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    /// Monotonic frame counter; palettes and stats are scoped to it.
    pub frame: u64,
    pub camera_position: Vec3,
    pub toggles: RenderToggles,
}

impl RenderContext {
    #[must_use]
    pub fn new(frame: u64, camera_position: Vec3, settings: &PipelineSettings) -> Self {
        Self {
            frame,
            camera_position,
            toggles: settings.toggles,
        }
    }

    #[must_use]
    pub fn with_toggles(mut self, toggles: RenderToggles) -> Self {
        self.toggles = toggles;
        self
    }

    #[inline]
    #[must_use]
    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.camera_position.distance(point)
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            frame: 0,
            camera_position: Vec3::ZERO,
            toggles: RenderToggles::default(),
        }
    }
}
