use glam::{Vec2, Vec3};

use crate::errors::Result;
use crate::resources::shape::VolumeFace;

/// Side normals with the two in-plane axes spanning `[-0.5, 0.5]`.
/// Order: +Z, -Z, +Y, -Y, +X, -X (face slots 0..6).
const SIDES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
];

/// Unit cube, one face per side, each side a grid of
/// `round(detail_scale)` segments per edge.
pub fn create_box(detail_scale: f32) -> Result<Vec<VolumeFace>> {
    let segments = (detail_scale.round() as u32).max(1);
    SIDES
        .iter()
        .enumerate()
        .map(|(slot, &(normal, u_axis, v_axis))| side(slot, normal, u_axis, v_axis, segments))
        .collect()
}

fn side(slot: usize, normal: Vec3, u_axis: Vec3, v_axis: Vec3, segments: u32) -> Result<VolumeFace> {
    let stride = segments + 1;
    let mut positions = Vec::with_capacity((stride * stride) as usize);
    let mut normals = Vec::with_capacity(positions.capacity());
    let mut uvs = Vec::with_capacity(positions.capacity());

    for y in 0..=segments {
        let v = y as f32 / segments as f32;
        for x in 0..=segments {
            let u = x as f32 / segments as f32;
            positions.push(normal * 0.5 + u_axis * (u - 0.5) + v_axis * (v - 0.5));
            normals.push(normal);
            uvs.push(Vec2::new(u, 1.0 - v));
        }
    }

    // Two counter-clockwise triangles per grid cell
    let mut indices = Vec::with_capacity((segments * segments * 6) as usize);
    for y in 0..segments {
        for x in 0..segments {
            let v0 = y * stride + x;
            let v1 = v0 + 1;
            let v2 = v0 + stride;
            let v3 = v2 + 1;
            indices.extend_from_slice(&[v0, v1, v3, v0, v3, v2].map(|i| i as u16));
        }
    }

    VolumeFace::new(slot, positions, normals, uvs, indices)
}
