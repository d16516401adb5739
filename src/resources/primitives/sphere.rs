use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::errors::Result;
use crate::resources::shape::VolumeFace;

pub struct SphereOptions {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl Default for SphereOptions {
    fn default() -> Self {
        Self {
            radius: 0.5,
            width_segments: 8,
            height_segments: 4,
        }
    }
}

/// UV sphere as a single face (slot 0).
pub fn create_sphere(options: &SphereOptions) -> Result<VolumeFace> {
    let radius = options.radius;
    let width_segments = options.width_segments.max(3);
    let height_segments = options.height_segments.max(2);

    let stride = width_segments + 1;
    let vertex_count = (stride * (height_segments + 1)) as usize;
    let mut positions = Vec::with_capacity(vertex_count);
    let mut normals = Vec::with_capacity(vertex_count);
    let mut uvs = Vec::with_capacity(vertex_count);
    let mut indices = Vec::with_capacity((width_segments * height_segments * 6) as usize);

    for y in 0..=height_segments {
        let v_ratio = y as f32 / height_segments as f32;
        // Latitude from the south pole (0) to the north pole (PI)
        let theta = v_ratio * PI;
        let py = -radius * theta.cos();
        let ring_radius = radius * theta.sin();

        for x in 0..=width_segments {
            let u_ratio = x as f32 / width_segments as f32;
            let phi = u_ratio * 2.0 * PI;

            let p = Vec3::new(-ring_radius * phi.cos(), py, ring_radius * phi.sin());
            positions.push(p);
            normals.push(p / radius);
            uvs.push(Vec2::new(u_ratio, 1.0 - v_ratio));
        }
    }

    // Pole rows produce degenerate triangles; they are kept so the index
    // layout stays a plain grid.
    for y in 0..height_segments {
        for x in 0..width_segments {
            let v0 = y * stride + x;
            let v1 = v0 + 1;
            let v2 = (y + 1) * stride + x;
            let v3 = v2 + 1;
            indices.extend_from_slice(&[v0, v1, v2, v1, v3, v2].map(|i| i as u16));
        }
    }

    VolumeFace::new(0, positions, normals, uvs, indices)
}
