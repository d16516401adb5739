//! Error Types
//!
//! This module defines the error types used by the volume pipeline.
//!
//! # Overview
//!
//! The per-frame path never returns an error: degenerate faces, missing skin
//! data and buffer overflows are recovered locally (skipped, identity-skinned
//! or dropped) and counted in [`FrameStats`](crate::pipeline::FrameStats).
//! [`PipelineError`] is returned by the fallible edges of the crate instead:
//! face and binding construction, settings loading and scene lookups.
//!
//! ```rust,ignore
//! use myth_volume::errors::{PipelineError, Result};
//!
//! fn load_settings(text: &str) -> Result<PipelineSettings> {
//!     PipelineSettings::from_json_str(text)
//! }
//! ```

use thiserror::Error;

/// The main error type for the volume pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    // ========================================================================
    // Geometry Errors
    // ========================================================================
    /// A face carries no vertices or no indices.
    #[error("Degenerate geometry: {context} ({vertices} vertices, {indices} indices)")]
    DegenerateGeometry {
        /// What was being built
        context: String,
        /// Vertex count of the rejected data
        vertices: usize,
        /// Index count of the rejected data
        indices: usize,
    },

    /// Index data does not describe whole triangles, or references a vertex
    /// outside the face.
    #[error("Inconsistent topology: {0}")]
    InconsistentTopology(String),

    /// More geometry than a single buffer (or spatial group) can hold.
    #[error("Buffer overflow: {requested} vertices requested, limit is {limit}")]
    BufferOverflow {
        /// Vertices that were asked for
        requested: usize,
        /// Ceiling that applied
        limit: usize,
    },

    // ========================================================================
    // Skinning Errors
    // ========================================================================
    /// Skin or joint data is absent or malformed.
    #[error("Missing skin binding: {0}")]
    MissingBinding(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings text could not be parsed.
    #[error("Settings parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    // ========================================================================
    // Scene Errors
    // ========================================================================
    /// The object key is stale or was never issued.
    #[error("Object not found: {0}")]
    ObjectNotFound(String),
}

/// Alias for `Result<T, PipelineError>`.
pub type Result<T> = std::result::Result<T, PipelineError>;
