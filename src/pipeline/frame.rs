//! Per-frame driver.
//!
//! [`VolumePipeline::run_frame`] walks every object once and then every
//! spatial group once:
//!
//! 1. Drop batches whose face references went stale.
//! 2. Per object: LOD selection, shape resolution, skinning, bounds, face
//!    classification and texture usage hints. Each stage only runs when its
//!    inputs changed.
//! 3. Per group: rebuild only the passes whose membership or geometry
//!    changed, within the group's node budget. Alpha is also rebuilt when
//!    the camera moved since it was last sorted.
//! 4. Refresh group bounds bottom-up and publish them to the partition.
//!
//! The frame never fails. Recoveries (dropped faces, missing bindings,
//! streaming fallbacks) are logged and counted in [`FrameStats`].

use std::sync::Arc;

use log::trace;

use crate::pipeline::batch::{BatchBuilder, BatchFace, BatchStats, DrawBatch, FaceRef, NodeBudget};
use crate::pipeline::bounds::BoundsAggregator;
use crate::pipeline::classify::{FaceClass, PassSet, RenderPass, classify_face};
use crate::pipeline::collaborators::{FrameServices, Rasterizer};
use crate::pipeline::context::RenderContext;
use crate::pipeline::deform::{DeformOutcome, SkinDeformer};
use crate::pipeline::lod::LodSelector;
use crate::resources::cache::ShapeCache;
use crate::resources::material::MaterialEntry;
use crate::resources::shape::ShapeParams;
use crate::scene::object::{DirtyFlags, VolumeObject};
use crate::scene::skeleton::PaletteCache;
use crate::scene::{GroupKey, ObjectKey, VolumeScene};
use crate::settings::PipelineSettings;

/// Counters of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub objects: usize,
    pub lod_changes: usize,
    pub partition_moves: usize,
    pub shapes_resolved: usize,
    /// Objects whose mesh resolved to a level other than the selected one.
    pub streaming_fallbacks: usize,
    pub deformed_objects: usize,
    pub missing_bindings: usize,
    pub palette_builds: usize,
    pub faces_classified: usize,
    pub bounds_updated: usize,
    /// Passes that lost batches to the generation check.
    pub stale_passes: usize,
    /// Groups whose Alpha pass was re-sorted for a new camera position.
    pub alpha_resorts: usize,
    pub passes_rebuilt: usize,
    pub batch: BatchStats,
}

/// What one object's update requires of its group.
#[derive(Debug, Clone, Copy, Default)]
struct ObjectUpdate {
    passes: PassSet,
    geometry_changed: bool,
}

pub struct VolumePipeline {
    settings: PipelineSettings,
    lod: LodSelector,
    deformer: SkinDeformer,
    builder: BatchBuilder,
    shapes: ShapeCache,
    palettes: PaletteCache,
}

impl Default for VolumePipeline {
    fn default() -> Self {
        Self::new(PipelineSettings::default())
    }
}

impl VolumePipeline {
    #[must_use]
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            lod: LodSelector::new(settings.lod.clone()),
            deformer: SkinDeformer::new(settings.skin),
            builder: BatchBuilder::new(settings.batch.clone()),
            shapes: ShapeCache::new(),
            palettes: PaletteCache::new(),
            settings,
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn shapes(&self) -> &ShapeCache {
        &self.shapes
    }

    #[inline]
    #[must_use]
    pub fn palettes(&self) -> &PaletteCache {
        &self.palettes
    }

    /// Runs the whole pipeline for one frame.
    pub fn run_frame(
        &mut self,
        scene: &mut VolumeScene,
        ctx: &RenderContext,
        services: &mut FrameServices<'_>,
    ) -> FrameStats {
        let mut stats = FrameStats {
            frame: ctx.frame,
            ..FrameStats::default()
        };
        self.palettes.begin_frame(ctx.frame);

        // Stale batches
        {
            let objects = &scene.objects;
            for group in scene.groups.values_mut() {
                let touched = group.draw_info.drop_stale(|face| {
                    objects
                        .get(face.object)
                        .is_some_and(|o| o.generation == face.generation)
                });
                stats.stale_passes += touched.iter().count();
                group.dirty_passes.extend(touched);
            }
        }

        // Objects
        let keys: Vec<ObjectKey> = scene.objects.keys().collect();
        let mut shapes_replaced = false;
        for key in keys {
            let Some(object) = scene.objects.get_mut(key) else {
                continue;
            };
            let group = object.group;
            let update =
                self.update_object(key, object, ctx, services, &mut stats, &mut shapes_replaced);
            if let Some(group) = group {
                scene.mark_passes_dirty(group, update.passes);
                if update.geometry_changed {
                    scene.mark_bounds_dirty(group);
                }
            }
            stats.objects += 1;
        }
        stats.palette_builds = self.palettes.builds_this_frame();
        if shapes_replaced {
            let pruned = self.shapes.prune_unused();
            if pruned > 0 {
                trace!("Pruned {pruned} unused shape(s)");
            }
        }

        // Alpha order depends on the view
        for group in scene.groups.values_mut() {
            let moved = group.alpha_view != Some(ctx.camera_position);
            if moved
                && !group.dirty_passes.contains(RenderPass::Alpha)
                && !group.draw_info.pass(RenderPass::Alpha).is_empty()
            {
                group.dirty_passes.insert(RenderPass::Alpha);
                stats.alpha_resorts += 1;
            }
        }

        // Groups
        let group_keys: Vec<GroupKey> = scene.groups.keys().collect();
        for group in group_keys {
            self.rebuild_group(scene, group, ctx, services, &mut stats);
        }

        let root = scene.root();
        BoundsAggregator::update_group(scene, root, services.partition);

        trace!(
            "Frame {}: {} objects, {} LOD changes, {} passes rebuilt, {} batches ({} faces, {} dropped)",
            stats.frame,
            stats.objects,
            stats.lod_changes,
            stats.passes_rebuilt,
            stats.batch.batches,
            stats.batch.faces_batched,
            stats.batch.degenerate_dropped + stats.batch.overflow_dropped
        );
        stats
    }

    fn update_object(
        &mut self,
        key: ObjectKey,
        object: &mut VolumeObject,
        ctx: &RenderContext,
        services: &mut FrameServices<'_>,
        stats: &mut FrameStats,
        shapes_replaced: &mut bool,
    ) -> ObjectUpdate {
        let mut update = ObjectUpdate::default();

        // LOD
        if self
            .lod
            .update_object(object, ctx.camera_position, &self.settings.bin_radius)
        {
            stats.lod_changes += 1;
        }
        if object.dirty.contains(DirtyFlags::PARTITION) {
            services.partition.mark_partition_move(key, object.bin_radius);
            stats.partition_moves += 1;
        }

        // Shape
        let streaming = object.shape.as_ref().is_some_and(|s| s.lod != object.lod);
        if object.dirty.contains(DirtyFlags::SHAPE) || object.shape.is_none() || streaming {
            let shape = self.shapes.resolve(&object.params, object.lod, services.meshes);
            let replaced = object.shape.as_ref().is_none_or(|old| {
                !(Arc::ptr_eq(old, &shape) || (old.key == shape.key && old.lod == shape.lod))
            });
            if shape.lod != object.lod {
                stats.streaming_fallbacks += 1;
            }
            if replaced {
                object.shape = Some(shape);
                object.dirty |= DirtyFlags::SHAPE;
                stats.shapes_resolved += 1;
                *shapes_replaced = true;
            } else {
                object.dirty.remove(DirtyFlags::SHAPE);
            }
        }
        if object.skinned && object.skin.is_none() {
            if let ShapeParams::Mesh(mesh) = object.params {
                if let Some(binding) = services.meshes.skin_binding(mesh) {
                    object.skin = Some(Arc::downgrade(&binding));
                    object.dirty |= DirtyFlags::SKIN;
                }
            }
        }

        // Skinning
        if SkinDeformer::is_required(object) || object.deformed.is_some() {
            match self
                .deformer
                .deform_object(object, &mut self.palettes, services.skeletons)
            {
                DeformOutcome::Deformed { .. } => {
                    stats.deformed_objects += 1;
                    object.dirty |= DirtyFlags::SKIN;
                }
                DeformOutcome::MissingBinding => {
                    stats.missing_bindings += 1;
                    object.dirty |= DirtyFlags::SKIN;
                }
                DeformOutcome::PassThrough => object.dirty |= DirtyFlags::SKIN,
            }
        }

        // Bounds
        if BoundsAggregator::update_object(object) {
            BoundsAggregator::publish_object(key, object, services.partition);
            stats.bounds_updated += 1;
            update.geometry_changed = true;
        }

        // Classification
        let reclassify = update.geometry_changed
            || object.dirty.contains(DirtyFlags::MATERIAL)
            || object.face_classes.len() != object.faces().len();
        if reclassify {
            let old: PassSet = object
                .face_classes
                .iter()
                .flat_map(|c| c.passes())
                .collect();
            let classes: Vec<FaceClass> = object
                .faces()
                .iter()
                .map(|face| {
                    let material = object
                        .materials
                        .get(face.slot)
                        .unwrap_or(&MaterialEntry::DEFAULT);
                    let animated = object.texture_animation.affects(face.slot);
                    classify_face(face, material, animated, ctx)
                })
                .collect();
            stats.faces_classified += classes.len();
            update.passes.extend(old);
            update.passes.extend(classes.iter().flat_map(|c| c.passes()).collect());
            object.face_classes = classes;
            object.bump_generation();
        }

        // Texture usage hints
        for face in object.faces() {
            let material = object
                .materials
                .get(face.slot)
                .unwrap_or(&MaterialEntry::DEFAULT);
            if let Some(texture) = material.texture_id() {
                services
                    .textures
                    .notify_usage(texture, object.app_angle, face.vertex_count() as u32);
            }
        }

        object.dirty = DirtyFlags::empty();
        update
    }

    fn rebuild_group(
        &self,
        scene: &mut VolumeScene,
        group_key: GroupKey,
        ctx: &RenderContext,
        services: &FrameServices<'_>,
        stats: &mut FrameStats,
    ) {
        let objects = &scene.objects;
        let Some(group) = scene.groups.get_mut(group_key) else {
            return;
        };
        let dirty = group.dirty_passes;
        if dirty.is_empty() {
            return;
        }

        // Bytes kept by passes that are not rebuilt count against the budget.
        let kept: usize = RenderPass::ALL
            .into_iter()
            .filter(|p| !dirty.contains(*p))
            .flat_map(|p| group.draw_info.buffers(p))
            .map(|b| b.byte_size())
            .sum();
        let total = u64::from(self.settings.batch.max_node_size_kb) * 1024;
        let mut budget = NodeBudget::from_bytes(total.saturating_sub(kept as u64));

        let mut per_pass: Vec<Vec<BatchFace<'_>>> = vec![Vec::new(); RenderPass::COUNT];
        for &key in &group.members {
            let Some(object) = objects.get(key) else {
                continue;
            };
            for (face, class) in object.faces().iter().zip(&object.face_classes) {
                let material = object
                    .materials
                    .get(face.slot)
                    .unwrap_or(&MaterialEntry::DEFAULT);
                let world_center = face.bounds.transform(&object.transform).center();
                for pass in class.passes() {
                    if !dirty.contains(pass) {
                        continue;
                    }
                    per_pass[pass.index()].push(BatchFace {
                        face_ref: FaceRef {
                            object: key,
                            slot: face.slot,
                            generation: object.generation,
                        },
                        face,
                        material,
                        flags: class.flags,
                        transform: object.transform,
                        distance: ctx.distance_to(world_center),
                    });
                }
            }
        }

        for (pass, faces) in RenderPass::ALL.into_iter().zip(per_pass) {
            if !dirty.contains(pass) {
                continue;
            }
            let mask = services.shaders.attribute_mask(pass);
            let output = self
                .builder
                .build(pass, mask, faces, pass.batch_mode(), &mut budget);
            stats.batch.accumulate(&output.stats);
            stats.passes_rebuilt += 1;
            group.draw_info.set_pass(pass, output);
        }
        if dirty.contains(RenderPass::Alpha) {
            group.alpha_view = Some(ctx.camera_position);
        }
        group.dirty_passes = PassSet::EMPTY;
    }

    /// Submits every group's draw lists, pass by pass.
    ///
    /// Distance-sorted passes are merged across groups so the rasterizer
    /// receives them farthest first.
    pub fn submit(&self, scene: &VolumeScene, rasterizer: &mut dyn Rasterizer) {
        for pass in RenderPass::ALL {
            if pass.is_distance_sorted() {
                Self::submit_back_to_front(scene, pass, rasterizer);
            } else {
                for group in scene.groups.values() {
                    group.draw_info.submit(pass, rasterizer);
                }
            }
        }
    }

    /// Consecutive batches of one group go out in a single call.
    fn submit_back_to_front(
        scene: &VolumeScene,
        pass: RenderPass,
        rasterizer: &mut dyn Rasterizer,
    ) {
        let lists: Vec<&[DrawBatch]> = scene
            .groups
            .values()
            .map(|g| g.draw_info.pass(pass))
            .filter(|batches| !batches.is_empty())
            .collect();
        if lists.len() <= 1 {
            for batches in lists {
                rasterizer.draw_pass(pass, batches);
            }
            return;
        }

        // Stable: equal distances keep group order, and each group's list is
        // already non-increasing.
        let mut order: Vec<(usize, usize)> = lists
            .iter()
            .enumerate()
            .flat_map(|(g, batches)| (0..batches.len()).map(move |b| (g, b)))
            .collect();
        order.sort_by(|&(ga, ba), &(gb, bb)| {
            lists[gb][bb]
                .max_distance
                .total_cmp(&lists[ga][ba].max_distance)
        });

        let mut run: Option<(usize, usize, usize)> = None;
        for (g, b) in order {
            match run {
                Some((group, start, end)) if group == g && end == b => {
                    run = Some((group, start, end + 1));
                }
                _ => {
                    if let Some((group, start, end)) = run {
                        rasterizer.draw_pass(pass, &lists[group][start..end]);
                    }
                    run = Some((g, b, b + 1));
                }
            }
        }
        if let Some((group, start, end)) = run {
            rasterizer.draw_pass(pass, &lists[group][start..end]);
        }
    }
}
