//! Content-addressed storage of tessellated shapes.
//!
//! Objects with equal [`ShapeParams`] at the same detail level share one
//! `Arc<VolumeShape>`. Keys are an xxh3 hash of the parameter bytes and the
//! level, so lookups never compare geometry.
//!
//! Mesh shapes depend on streaming: when the requested level has not arrived
//! the cache resolves the nearest coarser level, then the nearest finer one.
//! Fallback results are not cached under the requested key, so the real level
//! is picked up as soon as it streams in.

use std::sync::Arc;

use log::{debug, warn};
use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_64;

use crate::resources::primitives;
use crate::resources::shape::{
    MAX_LOD, MeshSource, ShapeKey, ShapeParams, UNRESOLVED_LOD, VolumeFace, VolumeShape,
};

/// Hash of a shape definition at one level.
#[must_use]
pub fn shape_key(params: &ShapeParams, lod: u8) -> ShapeKey {
    let mut bytes = [0u8; 13];
    bytes[..12].copy_from_slice(&params.key_bytes());
    bytes[12] = lod;
    ShapeKey(xxh3_64(&bytes))
}

#[derive(Default)]
pub struct ShapeCache {
    shapes: FxHashMap<ShapeKey, Arc<VolumeShape>>,
}

impl ShapeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shape for `params` at `lod`, building it on first use.
    ///
    /// The returned shape's `lod` is the level actually available. A mesh with
    /// no streamed level at all yields an empty shape marked
    /// [`UNRESOLVED_LOD`].
    pub fn resolve(
        &mut self,
        params: &ShapeParams,
        lod: u8,
        meshes: &dyn MeshSource,
    ) -> Arc<VolumeShape> {
        let lod = lod.min(MAX_LOD);
        let key = shape_key(params, lod);
        if let Some(shape) = self.shapes.get(&key) {
            return Arc::clone(shape);
        }

        match *params {
            ShapeParams::Mesh(mesh) => {
                if let Some(faces) = meshes.lod_faces(mesh, lod) {
                    return self.insert(key, *params, lod, faces.to_vec());
                }
                let fallback = (0..lod).rev().chain(lod + 1..=MAX_LOD);
                for candidate in fallback {
                    let candidate_key = shape_key(params, candidate);
                    if let Some(shape) = self.shapes.get(&candidate_key) {
                        return Arc::clone(shape);
                    }
                    if let Some(faces) = meshes.lod_faces(mesh, candidate) {
                        debug!("Mesh {mesh:?}: level {lod} not streamed, using {candidate}");
                        return self.insert(candidate_key, *params, candidate, faces.to_vec());
                    }
                }
                debug!("Mesh {mesh:?}: no level streamed yet");
                Arc::new(VolumeShape::new(key, *params, UNRESOLVED_LOD, Vec::new()))
            }
            _ => match primitives::tessellate(params, lod) {
                Ok(faces) => self.insert(key, *params, lod, faces),
                Err(e) => {
                    warn!("Failed to tessellate {params:?} at level {lod}: {e}");
                    Arc::new(VolumeShape::new(key, *params, lod, Vec::new()))
                }
            },
        }
    }

    fn insert(
        &mut self,
        key: ShapeKey,
        params: ShapeParams,
        lod: u8,
        faces: Vec<VolumeFace>,
    ) -> Arc<VolumeShape> {
        let shape = Arc::new(VolumeShape::new(key, params, lod, faces));
        self.shapes.insert(key, Arc::clone(&shape));
        shape
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: ShapeKey) -> Option<&Arc<VolumeShape>> {
        self.shapes.get(&key)
    }

    /// Drops shapes no object references any more. Returns how many went.
    pub fn prune_unused(&mut self) -> usize {
        let before = self.shapes.len();
        self.shapes.retain(|_, shape| Arc::strong_count(shape) > 1);
        before - self.shapes.len()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
