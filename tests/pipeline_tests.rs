//! Frame Pipeline Integration Tests
//!
//! Tests for:
//! - End-to-end batching of a multi-material mesh
//! - Incremental frames: no-op frames, material and shape edits, LOD transitions,
//!   texture animation
//! - Object removal and group moves
//! - Shape sharing, streaming fallback and pruning
//! - Skinning through the frame: inspection gating, shared palettes,
//!   missing bindings
//! - Collaborators: texture hints, partition updates, submission order
//! - Alpha ordering across camera moves and across spatial groups

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use myth_volume::pipeline::{
    DefaultShaderTable, DrawBatch, FrameServices, FrameStats, Rasterizer, RenderContext,
    RenderPass, SpatialPartition, TextureCache, VolumePipeline,
};
use myth_volume::resources::{
    MaterialEntry, MeshId, MeshSource, ShapeParams, SkinBinding, TextureId, TextureInfo,
    VertexWeights, VolumeFace,
};
use myth_volume::scene::{
    GroupKey, ObjectKey, SkeletonId, SkeletonSource, SpatialGroupBounds, TextureAnimation,
    VolumeObject, VolumeScene,
};
use myth_volume::settings::{BatchSettings, PipelineSettings};

const EPSILON: f32 = 1e-4;

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    (a - b).abs().max_element() < EPSILON
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Fixtures
// ============================================================================

fn quad(slot: usize, center: Vec3) -> VolumeFace {
    VolumeFace::new(
        slot,
        vec![
            center + Vec3::new(-0.5, -0.5, 0.0),
            center + Vec3::new(0.5, -0.5, 0.0),
            center + Vec3::new(0.5, 0.5, 0.0),
            center + Vec3::new(-0.5, 0.5, 0.0),
        ],
        vec![Vec3::Z; 4],
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ],
        vec![0, 1, 2, 0, 2, 3],
    )
    .expect("valid quad")
}

/// `count` quads spread along X around the origin.
fn quads(count: usize) -> Vec<VolumeFace> {
    (0..count)
        .map(|slot| quad(slot, Vec3::new(slot as f32 - count as f32 * 0.5, 0.0, 0.0)))
        .collect()
}

#[derive(Default)]
struct Meshes {
    levels: HashMap<(MeshId, u8), Arc<[VolumeFace]>>,
    bindings: HashMap<MeshId, Arc<SkinBinding>>,
}

impl Meshes {
    fn insert_all_levels(&mut self, mesh: MeshId, faces: &[VolumeFace]) {
        for lod in 0..4 {
            self.insert_level(mesh, lod, faces);
        }
    }

    fn insert_level(&mut self, mesh: MeshId, lod: u8, faces: &[VolumeFace]) {
        self.levels.insert((mesh, lod), Arc::from(faces.to_vec()));
    }
}

impl MeshSource for Meshes {
    fn lod_faces(&self, mesh: MeshId, lod: u8) -> Option<Arc<[VolumeFace]>> {
        self.levels.get(&(mesh, lod)).cloned()
    }

    fn skin_binding(&self, mesh: MeshId) -> Option<Arc<SkinBinding>> {
        self.bindings.get(&mesh).cloned()
    }
}

#[derive(Default)]
struct Skeletons {
    joints: HashMap<String, Mat4>,
}

impl SkeletonSource for Skeletons {
    fn joint_world_matrix(&self, _skeleton: SkeletonId, joint: &str) -> Option<Mat4> {
        self.joints.get(joint).copied()
    }
}

#[derive(Default)]
struct Textures {
    hints: Vec<(TextureId, f32, u32)>,
}

impl TextureCache for Textures {
    fn notify_usage(&mut self, texture: TextureId, priority: f32, size_hint: u32) {
        self.hints.push((texture, priority, size_hint));
    }
}

#[derive(Default)]
struct Partition {
    objects: HashMap<ObjectKey, SpatialGroupBounds>,
    groups: HashMap<GroupKey, SpatialGroupBounds>,
}

impl SpatialPartition for Partition {
    fn update_object_bounds(&mut self, object: ObjectKey, bounds: &SpatialGroupBounds) {
        self.objects.insert(object, *bounds);
    }

    fn update_group_bounds(&mut self, group: GroupKey, bounds: &SpatialGroupBounds) {
        self.groups.insert(group, *bounds);
    }
}

#[derive(Default)]
struct Recorder {
    passes: Vec<(RenderPass, usize)>,
    /// `max_distance` of every alpha batch, in the order received.
    alpha_distances: Vec<f32>,
}

impl Rasterizer for Recorder {
    fn draw_pass(&mut self, pass: RenderPass, batches: &[DrawBatch]) {
        self.passes.push((pass, batches.len()));
        if pass == RenderPass::Alpha {
            self.alpha_distances.extend(batches.iter().map(|b| b.max_distance));
        }
    }
}

/// Pipeline plus recording collaborators.
struct Harness {
    pipeline: VolumePipeline,
    meshes: Meshes,
    skeletons: Skeletons,
    textures: Textures,
    partition: Partition,
    frame: u64,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(PipelineSettings::default())
    }

    fn with_settings(settings: PipelineSettings) -> Self {
        init_logger();
        Self {
            pipeline: VolumePipeline::new(settings),
            meshes: Meshes::default(),
            skeletons: Skeletons::default(),
            textures: Textures::default(),
            partition: Partition::default(),
            frame: 0,
        }
    }

    fn run(&mut self, scene: &mut VolumeScene, camera: Vec3) -> FrameStats {
        self.frame += 1;
        let ctx = RenderContext::new(self.frame, camera, self.pipeline.settings());
        let mut services = FrameServices {
            meshes: &self.meshes,
            skeletons: &self.skeletons,
            shaders: &DefaultShaderTable,
            textures: &mut self.textures,
            partition: &mut self.partition,
        };
        self.pipeline.run_frame(scene, &ctx, &mut services)
    }
}

const CAMERA: Vec3 = Vec3::new(0.0, 0.0, 10.0);

fn root_pass(scene: &VolumeScene, pass: RenderPass) -> &[DrawBatch] {
    scene
        .group(scene.root())
        .expect("root group")
        .draw_info()
        .pass(pass)
}

fn member_count(batches: &[DrawBatch]) -> usize {
    batches.iter().map(|b| b.members.len()).sum()
}

// ============================================================================
// End-to-End
// ============================================================================

/// 40 faces in three material classes over two textures, with a budget of
/// four textures per batch.
#[test]
fn forty_faces_make_one_batch_per_pass() {
    let mesh = MeshId(1);
    let mut harness = Harness::with_settings(PipelineSettings {
        batch: BatchSettings {
            max_texture_index: 4,
            ..Default::default()
        },
        ..Default::default()
    });
    harness.meshes.insert_all_levels(mesh, &quads(40));

    let materials: Vec<MaterialEntry> = (0..40)
        .map(|i| {
            let base = MaterialEntry::textured(TextureInfo::new(1 + (i as u64 / 3) % 2));
            match i % 3 {
                0 => base,
                1 => MaterialEntry {
                    color_alpha: 0.5,
                    ..base
                },
                _ => MaterialEntry {
                    fullbright: true,
                    ..base
                },
            }
        })
        .collect();

    let mut scene = VolumeScene::new();
    scene.add_object(VolumeObject::new(ShapeParams::Mesh(mesh)).with_materials(materials));
    let stats = harness.run(&mut scene, CAMERA);

    let simple = root_pass(&scene, RenderPass::Simple);
    let alpha = root_pass(&scene, RenderPass::Alpha);
    let fullbright = root_pass(&scene, RenderPass::Fullbright);
    assert_eq!(simple.len(), 1);
    assert_eq!(alpha.len(), 1);
    assert_eq!(fullbright.len(), 1);
    assert_eq!(scene.batch_count(), 3);

    assert_eq!(member_count(simple), 14);
    assert_eq!(member_count(alpha), 13);
    assert_eq!(member_count(fullbright), 13);
    assert_eq!(simple[0].texture_count(), 2);

    let distances: Vec<f32> = alpha[0].members.iter().map(|m| m.distance).collect();
    assert!(distances.windows(2).all(|w| w[0] >= w[1]));

    assert_eq!(stats.faces_classified, 40);
    assert_eq!(stats.batch.faces_batched, 40);
    assert_eq!(stats.batch.vertices, 160);
}

#[test]
fn glowing_faces_are_also_drawn_in_the_glow_pass() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let glow = MaterialEntry {
        glow: 1.0,
        ..MaterialEntry::default()
    };
    scene.add_object(VolumeObject::new(ShapeParams::Sphere).with_materials(vec![glow]));
    harness.run(&mut scene, CAMERA);

    assert_eq!(root_pass(&scene, RenderPass::Simple).len(), 1);
    assert_eq!(root_pass(&scene, RenderPass::Glow).len(), 1);
}

// ============================================================================
// Incremental Frames
// ============================================================================

#[test]
fn unchanged_frame_does_no_work() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    scene.add_object(VolumeObject::new(ShapeParams::Box));

    let first = harness.run(&mut scene, CAMERA);
    assert_eq!(first.lod_changes, 1);
    assert_eq!(first.shapes_resolved, 1);
    assert!(first.passes_rebuilt > 0);

    let second = harness.run(&mut scene, CAMERA);
    assert_eq!(second.lod_changes, 0);
    assert_eq!(second.shapes_resolved, 0);
    assert_eq!(second.bounds_updated, 0);
    assert_eq!(second.faces_classified, 0);
    assert_eq!(second.passes_rebuilt, 0);
    assert_eq!(scene.batch_count(), 1);
}

#[test]
fn material_edit_moves_faces_between_passes() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let key = scene.add_object(VolumeObject::new(ShapeParams::Sphere));
    harness.run(&mut scene, CAMERA);
    assert_eq!(root_pass(&scene, RenderPass::Simple).len(), 1);

    let generation = scene.object(key).expect("object").generation();
    scene.object_mut(key).expect("object").set_material(
        0,
        MaterialEntry {
            color_alpha: 0.3,
            ..MaterialEntry::default()
        },
    );
    let stats = harness.run(&mut scene, CAMERA);

    assert!(root_pass(&scene, RenderPass::Simple).is_empty());
    let alpha = root_pass(&scene, RenderPass::Alpha);
    assert_eq!(alpha.len(), 1);
    let object = scene.object(key).expect("object");
    assert_ne!(object.generation(), generation);
    assert!(alpha[0]
        .members
        .iter()
        .all(|m| m.face.generation == object.generation()));
    assert_eq!(stats.passes_rebuilt, 2);
}

#[test]
fn approaching_camera_refines_the_shape() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    // LOD radius 2.0
    let key = scene.add_object(
        VolumeObject::new(ShapeParams::Sphere)
            .with_transform(Vec3::ZERO, Vec3::splat(4.0 / 3f32.sqrt())),
    );

    harness.run(&mut scene, Vec3::new(0.0, 0.0, 50.0));
    let far = scene.object(key).expect("object");
    assert_eq!(far.lod(), 0);
    let far_vertices = far.shape().expect("shape").vertex_count();

    let stats = harness.run(&mut scene, Vec3::new(0.0, 0.0, 0.5));
    let near = scene.object(key).expect("object");
    assert_eq!(stats.lod_changes, 1);
    assert_eq!(near.lod(), 3);
    assert!(near.shape().expect("shape").vertex_count() > far_vertices);

    // The coarse shape is no longer referenced.
    assert_eq!(harness.pipeline.shapes().len(), 1);
}

#[test]
fn changing_params_retessellates() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let key = scene.add_object(VolumeObject::new(ShapeParams::Box));
    harness.run(&mut scene, CAMERA);
    assert_eq!(scene.object(key).expect("object").faces().len(), 6);

    scene
        .object_mut(key)
        .expect("object")
        .set_params(ShapeParams::Cylinder { top_scale: 0.0 });
    let stats = harness.run(&mut scene, CAMERA);

    assert_eq!(stats.shapes_resolved, 1);
    assert_eq!(stats.faces_classified, 3);
    assert_eq!(scene.object(key).expect("object").faces().len(), 3);
    assert_eq!(harness.pipeline.shapes().len(), 1);
}

#[test]
fn animated_texture_face_gets_a_private_batch() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let shared = MaterialEntry::textured(TextureInfo::new(5));
    let key =
        scene.add_object(VolumeObject::new(ShapeParams::Box).with_materials(vec![shared; 6]));
    harness.run(&mut scene, CAMERA);
    assert_eq!(root_pass(&scene, RenderPass::Simple).len(), 1);

    scene
        .object_mut(key)
        .expect("object")
        .set_texture_animation(TextureAnimation::Face(2));
    harness.run(&mut scene, CAMERA);

    let simple = root_pass(&scene, RenderPass::Simple);
    assert_eq!(member_count(simple), 6);
    let private: Vec<&DrawBatch> = simple.iter().filter(|b| b.animated_texture).collect();
    assert_eq!(private.len(), 1);
    assert_eq!(private[0].members.len(), 1);
    assert_eq!(private[0].members[0].face.slot, 2);
}

// ============================================================================
// Removal
// ============================================================================

#[test]
fn removed_object_is_never_referenced_again() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let doomed = scene.add_object(VolumeObject::new(ShapeParams::Sphere));
    let survivor = scene.add_object(
        VolumeObject::new(ShapeParams::Sphere).with_transform(Vec3::new(3.0, 0.0, 0.0), Vec3::ONE),
    );
    harness.run(&mut scene, CAMERA);
    let simple = root_pass(&scene, RenderPass::Simple);
    assert_eq!(simple.len(), 1);
    assert!(simple[0].references(doomed) && simple[0].references(survivor));

    scene.remove_object(doomed).expect("object exists");
    assert!(!scene.is_referenced(doomed));
    assert_eq!(scene.batch_count(), 0);

    harness.run(&mut scene, CAMERA);
    assert!(!scene.is_referenced(doomed));
    let simple = root_pass(&scene, RenderPass::Simple);
    assert_eq!(simple.len(), 1);
    assert!(simple[0].references(survivor));
}

#[test]
fn removing_an_unknown_object_fails() {
    let mut scene = VolumeScene::new();
    let key = scene.add_object(VolumeObject::new(ShapeParams::Box));
    scene.remove_object(key).expect("object exists");
    assert!(scene.remove_object(key).is_err());
}

#[test]
fn moving_an_object_rebuilds_both_groups() -> anyhow::Result<()> {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let child = scene.add_group(scene.root())?;
    let key = scene.add_object(VolumeObject::new(ShapeParams::Box));
    harness.run(&mut scene, CAMERA);
    assert!(!root_pass(&scene, RenderPass::Simple).is_empty());

    scene.move_object(key, child)?;
    harness.run(&mut scene, CAMERA);

    assert!(root_pass(&scene, RenderPass::Simple).is_empty());
    let moved = scene.group(child).expect("child group").draw_info();
    assert!(moved.references(key));
    Ok(())
}

// ============================================================================
// Shapes
// ============================================================================

#[test]
fn identical_objects_share_a_shape() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let a = scene.add_object(VolumeObject::new(ShapeParams::Cylinder { top_scale: 1.0 }));
    let b = scene.add_object(VolumeObject::new(ShapeParams::Cylinder { top_scale: 1.0 }));
    harness.run(&mut scene, CAMERA);

    let shape_a = scene.object(a).expect("a").shape().expect("shape");
    let shape_b = scene.object(b).expect("b").shape().expect("shape");
    assert!(Arc::ptr_eq(shape_a, shape_b));
    assert_eq!(harness.pipeline.shapes().len(), 1);
}

#[test]
fn streaming_mesh_renders_the_available_level() {
    let mesh = MeshId(7);
    let mut harness = Harness::new();
    harness.meshes.insert_level(mesh, 0, &quads(2));

    let mut scene = VolumeScene::new();
    let key = scene.add_object(VolumeObject::new(ShapeParams::Mesh(mesh)));
    let camera = Vec3::new(0.0, 0.0, 0.5);

    let stats = harness.run(&mut scene, camera);
    let object = scene.object(key).expect("object");
    assert_eq!(object.lod(), 3);
    assert_eq!(object.shape().expect("shape").lod, 0);
    assert_eq!(stats.streaming_fallbacks, 1);
    assert_eq!(root_pass(&scene, RenderPass::Simple).len(), 1);

    // Still streaming: the fallback is kept, not rebuilt.
    let stats = harness.run(&mut scene, camera);
    assert_eq!(stats.streaming_fallbacks, 1);
    assert_eq!(stats.shapes_resolved, 0);
    assert_eq!(stats.passes_rebuilt, 0);

    harness.meshes.insert_level(mesh, 3, &quads(6));
    let stats = harness.run(&mut scene, camera);
    let object = scene.object(key).expect("object");
    assert_eq!(object.shape().expect("shape").lod, 3);
    assert_eq!(stats.streaming_fallbacks, 0);
    assert_eq!(member_count(root_pass(&scene, RenderPass::Simple)), 6);
    assert_eq!(harness.pipeline.shapes().len(), 1);
}

#[test]
fn mesh_with_nothing_streamed_draws_nothing() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let key = scene.add_object(VolumeObject::new(ShapeParams::Mesh(MeshId(99))));

    harness.run(&mut scene, CAMERA);
    assert_eq!(scene.batch_count(), 0);
    assert!(scene.object(key).expect("object").faces().is_empty());
}

// ============================================================================
// Skinning
// ============================================================================

fn rigged_mesh(harness: &mut Harness, mesh: MeshId) -> Arc<SkinBinding> {
    let faces = quads(2);
    let weights = faces
        .iter()
        .map(|f| vec![VertexWeights::single(0); f.vertex_count()])
        .collect();
    let binding = Arc::new(
        SkinBinding::new(
            11,
            vec!["root".to_string()],
            vec![Mat4::IDENTITY],
            Mat4::IDENTITY,
            weights,
        )
        .expect("valid binding"),
    );
    harness.meshes.insert_all_levels(mesh, &faces);
    harness.meshes.bindings.insert(mesh, Arc::clone(&binding));
    harness
        .skeletons
        .joints
        .insert("root".to_string(), Mat4::from_translation(Vec3::Y));
    binding
}

#[test]
fn only_inspected_rigged_attachments_are_deformed() {
    let mesh = MeshId(3);
    let mut harness = Harness::new();
    let binding = rigged_mesh(&mut harness, mesh);

    let mut scene = VolumeScene::new();
    let mut object = VolumeObject::new(ShapeParams::Mesh(mesh));
    object.set_skin(&binding, SkeletonId(1));
    object.set_rigged_attachment(true);
    let key = scene.add_object(object);

    let stats = harness.run(&mut scene, CAMERA);
    assert_eq!(stats.deformed_objects, 0);
    let rest_min = scene.object(key).expect("object").world_bounds().min;
    assert!(!scene.object(key).expect("object").is_deformed());

    scene.object_mut(key).expect("object").set_inspected(true);
    let stats = harness.run(&mut scene, CAMERA);
    assert_eq!(stats.deformed_objects, 1);
    let object = scene.object(key).expect("object");
    assert!(object.is_deformed());
    assert!(vec3_approx(object.world_bounds().min, rest_min + Vec3::Y));

    // Leaving inspection restores rest geometry.
    scene.object_mut(key).expect("object").set_inspected(false);
    harness.run(&mut scene, CAMERA);
    let object = scene.object(key).expect("object");
    assert!(!object.is_deformed());
    assert!(vec3_approx(object.world_bounds().min, rest_min));
}

#[test]
fn objects_sharing_a_skeleton_share_one_palette() {
    let mesh = MeshId(4);
    let mut harness = Harness::new();
    let binding = rigged_mesh(&mut harness, mesh);

    let mut scene = VolumeScene::new();
    for _ in 0..2 {
        let mut object = VolumeObject::new(ShapeParams::Mesh(mesh));
        object.set_skin(&binding, SkeletonId(5));
        object.set_rigged_attachment(true);
        object.set_inspected(true);
        scene.add_object(object);
    }

    let stats = harness.run(&mut scene, CAMERA);
    assert_eq!(stats.deformed_objects, 2);
    assert_eq!(stats.palette_builds, 1);
}

#[test]
fn binding_is_picked_up_from_the_mesh() {
    let mesh = MeshId(5);
    let mut harness = Harness::new();
    rigged_mesh(&mut harness, mesh);

    let mut scene = VolumeScene::new();
    let mut object = VolumeObject::new(ShapeParams::Mesh(mesh));
    object.set_skinned(SkeletonId(1));
    object.set_rigged_attachment(true);
    object.set_inspected(true);
    let key = scene.add_object(object);

    let stats = harness.run(&mut scene, CAMERA);
    assert_eq!(stats.deformed_objects, 1);
    assert!(scene.object(key).expect("object").skin_binding().is_some());
}

#[test]
fn missing_binding_renders_rest_geometry() {
    let mesh = MeshId(6);
    let mut harness = Harness::new();
    harness.meshes.insert_all_levels(mesh, &quads(2));

    let mut scene = VolumeScene::new();
    let mut object = VolumeObject::new(ShapeParams::Mesh(mesh));
    object.set_skinned(SkeletonId(1));
    object.set_rigged_attachment(true);
    object.set_inspected(true);
    let key = scene.add_object(object);

    for _ in 0..2 {
        let stats = harness.run(&mut scene, CAMERA);
        assert_eq!(stats.missing_bindings, 1);
        assert_eq!(stats.deformed_objects, 0);
    }
    let object = scene.object(key).expect("object");
    assert!(!object.is_deformed());
    assert_eq!(object.faces().len(), 2);
    assert_eq!(root_pass(&scene, RenderPass::Simple).len(), 1);
}

#[test]
fn dropped_binding_is_a_missing_binding() {
    let mesh = MeshId(8);
    let mut harness = Harness::new();
    harness.meshes.insert_all_levels(mesh, &quads(2));
    let binding = Arc::new(
        SkinBinding::new(
            12,
            vec!["root".to_string()],
            vec![Mat4::IDENTITY],
            Mat4::IDENTITY,
            vec![vec![VertexWeights::single(0); 4]; 2],
        )
        .expect("valid binding"),
    );

    let mut scene = VolumeScene::new();
    let mut object = VolumeObject::new(ShapeParams::Mesh(mesh));
    object.set_skin(&binding, SkeletonId(1));
    object.set_rigged_attachment(true);
    object.set_inspected(true);
    scene.add_object(object);
    drop(binding);

    let stats = harness.run(&mut scene, CAMERA);
    assert_eq!(stats.missing_bindings, 1);
}

// ============================================================================
// Collaborators
// ============================================================================

#[test]
fn textures_receive_usage_hints() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let key = scene.add_object(
        VolumeObject::new(ShapeParams::Sphere)
            .with_materials(vec![MaterialEntry::textured(TextureInfo::new(77))]),
    );
    harness.run(&mut scene, CAMERA);

    let object = scene.object(key).expect("object");
    let vertices = object.faces()[0].vertex_count() as u32;
    assert_eq!(harness.textures.hints.len(), 1);
    let (texture, priority, size) = harness.textures.hints[0];
    assert_eq!(texture, TextureId(77));
    assert!((priority - object.app_angle()).abs() < EPSILON);
    assert_eq!(size, vertices);
}

#[test]
fn partition_receives_object_and_group_bounds() -> anyhow::Result<()> {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let child = scene.add_group(scene.root())?;
    let near = scene.add_object(VolumeObject::new(ShapeParams::Box));
    let far = scene.add_object_to(
        child,
        VolumeObject::new(ShapeParams::Box).with_transform(Vec3::new(10.0, 0.0, 0.0), Vec3::ONE),
    )?;
    harness.run(&mut scene, CAMERA);

    let partition = &harness.partition;
    assert!(partition.objects.contains_key(&near));
    assert!(vec3_approx(partition.objects[&far].min, Vec3::new(9.5, -0.5, -0.5)));

    let root = scene.group(scene.root()).expect("root").bounds();
    assert!(vec3_approx(root.min, Vec3::splat(-0.5)));
    assert!(vec3_approx(root.max, Vec3::new(10.5, 0.5, 0.5)));
    assert!(vec3_approx(partition.groups[&child].center, Vec3::new(10.0, 0.0, 0.0)));
    assert_eq!(partition.groups[&scene.root()], *root);
    Ok(())
}

#[test]
fn group_bounds_follow_moved_objects() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let key = scene.add_object(VolumeObject::new(ShapeParams::Box));
    harness.run(&mut scene, CAMERA);

    scene
        .object_mut(key)
        .expect("object")
        .set_transform(Vec3::new(0.0, 5.0, 0.0), Vec3::ONE);
    let stats = harness.run(&mut scene, CAMERA);
    assert_eq!(stats.bounds_updated, 1);
    let root = scene.group(scene.root()).expect("root").bounds();
    assert!(vec3_approx(root.center, Vec3::new(0.0, 5.0, 0.0)));
}

#[test]
fn submission_follows_pass_order() {
    let mut harness = Harness::new();
    let mut scene = VolumeScene::new();
    let mixed = vec![
        MaterialEntry {
            color_alpha: 0.5,
            ..MaterialEntry::default()
        },
        MaterialEntry {
            fullbright: true,
            ..MaterialEntry::default()
        },
        MaterialEntry::default(),
        MaterialEntry {
            glow: 1.0,
            ..MaterialEntry::default()
        },
        MaterialEntry::textured(TextureInfo::new(3).alpha_only()),
        MaterialEntry::default(),
    ];
    scene.add_object(VolumeObject::new(ShapeParams::Box).with_materials(mixed));
    harness.run(&mut scene, CAMERA);

    let mut recorder = Recorder::default();
    harness.pipeline.submit(&scene, &mut recorder);

    let order: Vec<usize> = recorder.passes.iter().map(|(p, _)| p.index()).collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]), "{order:?}");
    let passes: Vec<RenderPass> = recorder.passes.iter().map(|(p, _)| *p).collect();
    assert_eq!(
        passes,
        vec![
            RenderPass::Simple,
            RenderPass::Fullbright,
            RenderPass::Invisible,
            RenderPass::Alpha,
            RenderPass::Glow,
        ]
    );
}

#[test]
fn exhausted_node_budget_drops_geometry_without_failing() {
    let mut settings = PipelineSettings::default();
    settings.batch.max_node_size_kb = 1;
    let mut harness = Harness::with_settings(settings);
    let mut scene = VolumeScene::new();
    scene.add_object(
        VolumeObject::new(ShapeParams::Sphere).with_transform(Vec3::ZERO, Vec3::splat(40.0)),
    );

    let stats = harness.run(&mut scene, Vec3::new(0.0, 0.0, 25.0));
    assert!(stats.batch.overflow_dropped > 0);
    assert_eq!(stats.batch.faces_batched, 0);
}

// ============================================================================
// Alpha Ordering
// ============================================================================

fn no_multiplexing() -> PipelineSettings {
    PipelineSettings {
        batch: BatchSettings {
            texture_multiplexing: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Small blended sphere at `z`, with its own texture so it gets its own batch.
fn blended_sphere(z: f32, texture: u64) -> VolumeObject {
    VolumeObject::new(ShapeParams::Sphere)
        .with_transform(Vec3::new(0.0, 0.0, z), Vec3::splat(0.1))
        .with_materials(vec![MaterialEntry {
            color_alpha: 0.5,
            ..MaterialEntry::textured(TextureInfo::new(texture))
        }])
}

fn is_back_to_front(distances: &[f32]) -> bool {
    distances.windows(2).all(|w| w[0] >= w[1])
}

#[test]
fn alpha_is_resorted_when_the_camera_moves() {
    let mut harness = Harness::with_settings(no_multiplexing());
    let mut scene = VolumeScene::new();
    let front = scene.add_object(blended_sphere(3.0, 1));
    let back = scene.add_object(blended_sphere(-3.0, 2));

    harness.run(&mut scene, Vec3::new(0.0, 0.0, 10.0));
    let alpha = root_pass(&scene, RenderPass::Alpha);
    assert_eq!(alpha.len(), 2);
    assert!(alpha[0].references(back));
    assert!((alpha[0].max_distance - 13.0).abs() < EPSILON);

    // Same distances from the other side; nothing else changes.
    let stats = harness.run(&mut scene, Vec3::new(0.0, 0.0, -10.0));
    assert_eq!(stats.alpha_resorts, 1);
    assert_eq!(stats.passes_rebuilt, 1);
    let alpha = root_pass(&scene, RenderPass::Alpha);
    assert_eq!(alpha.len(), 2);
    assert!(alpha[0].references(front));
    let distances: Vec<f32> = alpha.iter().map(|b| b.max_distance).collect();
    assert!(is_back_to_front(&distances), "{distances:?}");
    assert!((distances[0] - 13.0).abs() < EPSILON);

    // Camera still again: no resort.
    let stats = harness.run(&mut scene, Vec3::new(0.0, 0.0, -10.0));
    assert_eq!(stats.alpha_resorts, 0);
    assert_eq!(stats.passes_rebuilt, 0);
}

#[test]
fn alpha_is_submitted_back_to_front_across_groups() -> anyhow::Result<()> {
    let mut harness = Harness::with_settings(no_multiplexing());
    let mut scene = VolumeScene::new();
    let near_group = scene.add_group(scene.root())?;
    let far_group = scene.add_group(scene.root())?;
    scene.add_object_to(near_group, blended_sphere(3.0, 1))?;
    scene.add_object_to(far_group, blended_sphere(-3.0, 2))?;
    harness.run(&mut scene, CAMERA);

    let mut recorder = Recorder::default();
    harness.pipeline.submit(&scene, &mut recorder);

    let distances = &recorder.alpha_distances;
    assert_eq!(distances.len(), 2);
    assert!(is_back_to_front(distances), "{distances:?}");
    assert!((distances[0] - 13.0).abs() < EPSILON);
    assert!((distances[1] - 7.0).abs() < EPSILON);
    Ok(())
}

#[test]
fn interleaved_alpha_groups_are_merged_by_distance() -> anyhow::Result<()> {
    let mut harness = Harness::with_settings(no_multiplexing());
    let mut scene = VolumeScene::new();
    let a = scene.add_group(scene.root())?;
    let b = scene.add_group(scene.root())?;
    scene.add_object_to(a, blended_sphere(4.0, 1))?;
    scene.add_object_to(a, blended_sphere(-4.0, 2))?;
    scene.add_object_to(b, blended_sphere(0.0, 3))?;
    harness.run(&mut scene, CAMERA);

    let mut recorder = Recorder::default();
    harness.pipeline.submit(&scene, &mut recorder);

    let distances = &recorder.alpha_distances;
    assert_eq!(distances.len(), 3);
    assert!(is_back_to_front(distances), "{distances:?}");
    // Group a is split around group b.
    let alpha_calls = recorder
        .passes
        .iter()
        .filter(|(p, _)| *p == RenderPass::Alpha)
        .count();
    assert_eq!(alpha_calls, 3);
    Ok(())
}
