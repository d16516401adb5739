//! Settings Tests
//!
//! Tests for:
//! - Defaults of every settings group
//! - Derived limits: texture channel budget, per-buffer vertex ceiling
//! - JSON loading: partial overrides, parse errors, validation errors

use myth_volume::errors::PipelineError;
use myth_volume::settings::{BatchSettings, LodSettings, PipelineSettings};

const EPSILON: f32 = 1e-6;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn lod_defaults() {
    let lod = LodSettings::default();
    assert!(lod.dynamic_lod);
    assert!(approx(lod.lod_factor, 1.0));
    assert!(approx(lod.fov_compensation, std::f32::consts::FRAC_PI_3));
    assert_eq!(lod.detail_thresholds, [0.5, 1.0, 2.0]);
    assert!(approx(lod.ramp_distance(), 2.0));
}

#[test]
fn default_settings_validate() {
    assert!(PipelineSettings::default().validate().is_ok());
}

// ============================================================================
// Derived Limits
// ============================================================================

#[test]
fn texture_budget_reserves_one_channel() {
    let batch = BatchSettings {
        indexed_texture_channels: 8,
        max_texture_index: 16,
        ..BatchSettings::default()
    };
    assert_eq!(batch.texture_channel_budget(), 7);
}

#[test]
fn texture_budget_honours_the_user_cap() {
    let batch = BatchSettings {
        max_texture_index: 4,
        ..BatchSettings::default()
    };
    assert_eq!(batch.texture_channel_budget(), 4);
}

#[test]
fn texture_budget_without_multiplexing_is_one() {
    let batch = BatchSettings {
        texture_multiplexing: false,
        ..BatchSettings::default()
    };
    assert_eq!(batch.texture_channel_budget(), 1);
}

#[test]
fn vertex_ceiling_from_buffer_size() {
    let batch = BatchSettings::default();
    // 512 KiB / 48 bytes
    assert_eq!(batch.max_vertices(48), 10922);
    // Tiny vertices hit the 16-bit index limit.
    assert_eq!(batch.max_vertices(4), 65535);
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn partial_json_overrides_only_named_fields() -> anyhow::Result<()> {
    let settings = PipelineSettings::from_json_str(
        r#"{ "lod": { "lod_factor": 2.0 }, "batch": { "texture_multiplexing": false } }"#,
    )?;
    assert!(approx(settings.lod.lod_factor, 2.0));
    assert!(settings.lod.dynamic_lod);
    assert!(!settings.batch.texture_multiplexing);
    assert_eq!(settings.batch.max_vbo_size_kb, 512);
    assert_eq!(settings.bin_radius, PipelineSettings::default().bin_radius);
    Ok(())
}

#[test]
fn empty_json_is_the_default() -> anyhow::Result<()> {
    assert_eq!(PipelineSettings::from_json_str("{}")?, PipelineSettings::default());
    Ok(())
}

#[test]
fn settings_survive_serialization() -> anyhow::Result<()> {
    let mut settings = PipelineSettings::default();
    settings.toggles.glow_enabled = false;
    settings.bin_radius.repartition_tolerance = 0.25;
    let text = serde_json::to_string(&settings)?;
    assert_eq!(PipelineSettings::from_json_str(&text)?, settings);
    Ok(())
}

#[test]
fn malformed_json_is_a_parse_error() {
    let result = PipelineSettings::from_json_str("{ lod: ");
    assert!(matches!(result, Err(PipelineError::ConfigParse(_))));
}

#[test]
fn non_positive_quality_is_rejected() {
    let result = PipelineSettings::from_json_str(r#"{ "lod": { "lod_factor": 0.0 } }"#);
    assert!(matches!(result, Err(PipelineError::InvalidSettings(_))));
}

#[test]
fn descending_thresholds_are_rejected() {
    let result =
        PipelineSettings::from_json_str(r#"{ "lod": { "detail_thresholds": [2.0, 1.0, 0.5] } }"#);
    assert!(matches!(result, Err(PipelineError::InvalidSettings(_))));
}

#[test]
fn vertex_limit_above_sixteen_bits_is_rejected() {
    let result = PipelineSettings::from_json_str(r#"{ "batch": { "hard_vertex_limit": 70000 } }"#);
    assert!(matches!(result, Err(PipelineError::InvalidSettings(_))));
}

#[test]
fn empty_bin_radius_range_is_rejected() {
    let mut settings = PipelineSettings::default();
    settings.bin_radius.min_radius = 10.0;
    settings.bin_radius.max_radius = 1.0;
    assert!(matches!(
        settings.validate(),
        Err(PipelineError::InvalidSettings(_))
    ));
}
