use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::errors::Result;
use crate::resources::shape::VolumeFace;

/// Y-aligned cylinder of diameter and height one.
///
/// Slot 0 is the side, slot 1 the top cap, slot 2 the bottom cap. The top
/// ring radius is scaled by `top_scale`; a zero top gives a cone whose top
/// cap is degenerate.
pub fn create_cylinder(radial_segments: u32, top_scale: f32) -> Result<Vec<VolumeFace>> {
    let radial = radial_segments.max(3);
    let top_radius = 0.5 * top_scale.clamp(0.0, 1.0);
    let bottom_radius = 0.5;

    let ring = |r: f32, y: f32| -> Vec<Vec3> {
        (0..=radial)
            .map(|i| {
                let phi = i as f32 / radial as f32 * 2.0 * PI;
                Vec3::new(r * phi.cos(), y, -r * phi.sin())
            })
            .collect()
    };
    let bottom = ring(bottom_radius, -0.5);
    let top = ring(top_radius, 0.5);

    // Side: two rings, bottom first
    let slope = bottom_radius - top_radius;
    let mut positions = Vec::with_capacity(bottom.len() * 2);
    let mut normals = Vec::with_capacity(bottom.len() * 2);
    let mut uvs = Vec::with_capacity(bottom.len() * 2);
    for (row, points) in [&bottom, &top].into_iter().enumerate() {
        for (i, &p) in points.iter().enumerate() {
            let phi = i as f32 / radial as f32 * 2.0 * PI;
            let n = Vec3::new(phi.cos(), slope, -phi.sin()).normalize_or_zero();
            positions.push(p);
            normals.push(n);
            uvs.push(Vec2::new(i as f32 / radial as f32, 1.0 - row as f32));
        }
    }
    let stride = radial + 1;
    let mut indices = Vec::with_capacity((radial * 6) as usize);
    for i in 0..radial {
        let v0 = i;
        let v1 = i + 1;
        let v2 = i + stride;
        let v3 = v2 + 1;
        indices.extend_from_slice(&[v0, v1, v3, v0, v3, v2].map(|i| i as u16));
    }
    let side = VolumeFace::new(0, positions, normals, uvs, indices)?;

    let top_cap = cap(1, &top, 0.5, Vec3::Y, top_radius, false)?;
    let bottom_cap = cap(2, &bottom, -0.5, Vec3::NEG_Y, bottom_radius, true)?;

    Ok(vec![side, top_cap, bottom_cap])
}

/// Triangle fan around a center vertex.
fn cap(slot: usize, rim: &[Vec3], y: f32, normal: Vec3, radius: f32, flip: bool) -> Result<VolumeFace> {
    let mut positions = Vec::with_capacity(rim.len() + 1);
    positions.push(Vec3::new(0.0, y, 0.0));
    positions.extend_from_slice(rim);

    let normals = vec![normal; positions.len()];
    let uvs = positions
        .iter()
        .map(|p| {
            if radius > 0.0 {
                Vec2::new(p.x / radius * 0.5 + 0.5, p.z / radius * 0.5 + 0.5)
            } else {
                Vec2::splat(0.5)
            }
        })
        .collect();

    let mut indices = Vec::with_capacity((rim.len() - 1) * 3);
    for i in 1..rim.len() {
        let (a, b) = (i as u16, i as u16 + 1);
        if flip {
            indices.extend_from_slice(&[0, b, a]);
        } else {
            indices.extend_from_slice(&[0, a, b]);
        }
    }

    VolumeFace::new(slot, positions, normals, uvs, indices)
}
