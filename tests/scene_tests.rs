//! Scene orchestration tests
//!
//! Tests for:
//! - Factory operations and name lookup
//! - Entity removal cascade
//! - Armature skinning, packed bone buffer, missing bones
//! - Scene merge: ID remapping, reference rewriting, physics handle reset
//! - Deferred command queue: safe-point flush, cancellation

use std::thread;

use glam::{Affine3A, Mat4, Quat, Vec3, Vec4};
use myth_scene::animation::{AnimationChannel, AnimationPath, AnimationSampler, SamplerMode};
use myth_scene::scene::components::{MeshSubset, PhysicsHandle};
use myth_scene::scene::ShaderBone;
use myth_scene::{AnimationComponent, ArmatureComponent, Entity, Scene};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-5;

fn mat4_approx(a: &Mat4, b: &Mat4) -> bool {
    a.abs_diff_eq(*b, EPSILON)
}

/// Routes the crate's `log` output to the test harness (`RUST_LOG=debug`).
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// object → mesh → (material, armature → bones), bone1 child of bone0,
/// animation driving bone0, rigid body on the object.
struct Fixture {
    object: Entity,
    mesh: Entity,
    material: Entity,
    armature: Entity,
    bones: [Entity; 2],
    animation: Entity,
}

fn build_fixture(scene: &mut Scene) -> Fixture {
    init_logging();
    let material = scene.create_material("skin");
    let mesh = scene.create_mesh("body");
    let armature = scene.create_armature("rig");
    let bone0 = scene.create_node("hip");
    let bone1 = scene.create_node("knee");
    let object = scene.create_object("character");
    let animation = scene.create_animation("walk");

    scene.transforms.get_mut(bone1).unwrap().set_translation(Vec3::Y);
    scene.attach_local(bone1, bone0);

    *scene.armatures.get_mut(armature).unwrap() =
        ArmatureComponent::new(vec![bone0, bone1], vec![Affine3A::IDENTITY; 2]);
    {
        let m = scene.meshes.get_mut(mesh).unwrap();
        m.armature = armature;
        m.subsets.push(MeshSubset {
            material,
            index_offset: 0,
            index_count: 3,
        });
    }
    scene.objects.get_mut(object).unwrap().mesh = mesh;
    *scene.animations.get_mut(animation).unwrap() = AnimationComponent::new(
        vec![AnimationChannel::new(bone0, AnimationPath::Translation, 0)],
        vec![AnimationSampler::new(
            SamplerMode::Linear,
            vec![0.0, 1.0],
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        )],
    );
    let body = scene.rigidbodies.create(object);
    body.physics_handle = Some(PhysicsHandle(99));

    Fixture {
        object,
        mesh,
        material,
        armature,
        bones: [bone0, bone1],
        animation,
    }
}

// ============================================================================
// Factories
// ============================================================================

#[test]
fn factories_create_expected_components() {
    let mut scene = Scene::new();
    let object = scene.create_object("obj");
    let mesh = scene.create_mesh("mesh");
    let material = scene.create_material("mat");
    let armature = scene.create_armature("arm");
    let anim = scene.create_animation("anim");

    assert!(scene.objects.contains(object) && scene.transforms.contains(object));
    assert!(scene.meshes.contains(mesh) && !scene.transforms.contains(mesh));
    assert!(scene.materials.contains(material));
    assert!(scene.armatures.contains(armature) && scene.transforms.contains(armature));
    assert!(scene.animations.contains(anim));

    assert_eq!(scene.find_by_name("mat"), Some(material));
    assert_eq!(scene.find_by_name("nothing"), None);
    assert_eq!(scene.entities().len(), 5);
}

#[test]
fn remove_entity_clears_every_table() {
    let mut scene = Scene::new();
    let f = build_fixture(&mut scene);

    scene.remove_entity(f.object);
    assert!(!scene.contains_entity(f.object));
    assert!(!scene.rigidbodies.contains(f.object));
    assert!(scene.meshes.contains(f.mesh));

    scene.remove_entity_recursive(f.bones[0]);
    assert!(!scene.contains_entity(f.bones[0]));
    assert!(!scene.contains_entity(f.bones[1]));
}

#[test]
fn clear_empties_scene() {
    let mut scene = Scene::new();
    build_fixture(&mut scene);
    scene.clear();
    assert!(scene.entities().is_empty());
    scene.update(0.1);
}

// ============================================================================
// Armature
// ============================================================================

#[test]
fn skin_matrix_is_remap_bone_world_inverse_bind() {
    let mut scene = Scene::new();
    let bone = scene.create_node("bone");
    let armature = scene.create_armature("rig");
    {
        let t = scene.transforms.get_mut(bone).unwrap();
        t.set_translation(Vec3::new(1.0, 2.0, 3.0));
        t.set_rotation(Quat::from_rotation_x(0.5));
    }
    let ibm = Affine3A::from_translation(Vec3::new(0.0, -2.0, 0.0));
    let remap = Affine3A::from_scale(Vec3::new(-1.0, 1.0, 1.0));
    {
        let a = scene.armatures.get_mut(armature).unwrap();
        *a = ArmatureComponent::new(vec![bone], vec![ibm]);
        a.remap = remap;
    }

    scene.update(0.0);

    let world = *scene.transforms.get(bone).unwrap().world_matrix();
    let expected = Mat4::from(remap * world * ibm);
    let a = scene.armatures.get(armature).unwrap();
    assert!(mat4_approx(&a.skin_matrices()[0], &expected));

    let packed = a.bone_data()[0];
    assert_eq!(packed, ShaderBone::from(&a.skin_matrices()[0]));
    assert_eq!(packed.pose0, expected.row(0));
    assert_eq!(a.bone_bytes().len(), std::mem::size_of::<ShaderBone>());
    assert!(mat4_approx(&packed.to_mat4(), &expected));
}

#[test]
fn missing_bone_keeps_previous_matrix() {
    let mut scene = Scene::new();
    let f = build_fixture(&mut scene);
    scene.update(0.0);

    let before = scene.armatures.get(f.armature).unwrap().skin_matrices()[1];
    scene.remove_entity(f.bones[1]);
    scene.transforms.get_mut(f.bones[0]).unwrap().translate(Vec3::Z);
    scene.update(0.0);

    let a = scene.armatures.get(f.armature).unwrap();
    assert_eq!(a.skin_matrices()[1], before);
    assert_eq!(a.skin_matrices()[0].w_axis, Vec4::new(0.0, 0.0, 1.0, 1.0));
}

#[test]
fn bone_buffer_version_tracks_changes() {
    let mut scene = Scene::new();
    let f = build_fixture(&mut scene);
    scene.update(0.0);
    let v0 = scene.armatures.get(f.armature).unwrap().version();

    scene.update(0.0);
    assert_eq!(scene.armatures.get(f.armature).unwrap().version(), v0);

    scene.transforms.get_mut(f.bones[0]).unwrap().translate(Vec3::X);
    scene.update(0.0);
    assert!(scene.armatures.get(f.armature).unwrap().version() > v0);
}

#[test]
fn animation_drives_skinning_end_to_end() {
    let mut scene = Scene::new();
    let f = build_fixture(&mut scene);
    scene.animations.get_mut(f.animation).unwrap().play();

    scene.update(0.5);
    let a = scene.armatures.get(f.armature).unwrap();
    // knee: hip(0.5, 0, 0) * local(0, 1, 0)
    assert!(a.skin_matrices()[1]
        .w_axis
        .abs_diff_eq(Vec4::new(0.5, 1.0, 0.0, 1.0), EPSILON));
}

// ============================================================================
// Merge
// ============================================================================

#[test]
fn merge_remaps_ids_without_collisions() {
    let mut target = Scene::new();
    let existing = build_fixture(&mut target);
    let before: Vec<Entity> = target.entities();

    let mut incoming = Scene::new();
    let f = build_fixture(&mut incoming);
    let incoming_ids = incoming.entities();

    let remap = target.merge(incoming);
    assert_eq!(remap.len(), incoming_ids.len());

    for old in &incoming_ids {
        let new = remap.get(*old).unwrap();
        assert_ne!(new, *old);
        assert!(!before.contains(&new));
        assert!(target.contains_entity(new));
    }
    assert_eq!(target.entities().len(), before.len() * 2);

    // References follow the remap
    let object = remap.get(f.object).unwrap();
    let mesh = remap.get(f.mesh).unwrap();
    assert_eq!(target.objects.get(object).unwrap().mesh, mesh);
    let m = target.meshes.get(mesh).unwrap();
    assert_eq!(m.armature, remap.get(f.armature).unwrap());
    assert_eq!(m.subsets[0].material, remap.get(f.material).unwrap());
    assert_eq!(
        target.armatures.get(remap.get(f.armature).unwrap()).unwrap().bones,
        vec![remap.get(f.bones[0]).unwrap(), remap.get(f.bones[1]).unwrap()]
    );
    assert_eq!(
        target.parent_of(remap.get(f.bones[1]).unwrap()),
        remap.get(f.bones[0])
    );
    let anim = target.animations.get(remap.get(f.animation).unwrap()).unwrap();
    assert_eq!(anim.channels[0].target, remap.get(f.bones[0]).unwrap());

    // The pre-existing fixture is untouched
    assert_eq!(target.objects.get(existing.object).unwrap().mesh, existing.mesh);
}

#[test]
fn merge_keeps_values_and_clears_physics_handles() {
    let mut target = Scene::new();
    let mut incoming = Scene::new();
    let f = build_fixture(&mut incoming);
    incoming
        .transforms
        .get_mut(f.bones[0])
        .unwrap()
        .set_translation(Vec3::new(4.0, 5.0, 6.0));

    let remap = target.merge(incoming);
    let bone = remap.get(f.bones[0]).unwrap();
    assert_eq!(
        target.transforms.get(bone).unwrap().translation_local,
        Vec3::new(4.0, 5.0, 6.0)
    );
    let body = target.rigidbodies.get(remap.get(f.object).unwrap()).unwrap();
    assert_eq!(body.physics_handle, None);

    // Merged hierarchy resolves on the next tick
    target.update(0.0);
    let knee = remap.get(f.bones[1]).unwrap();
    assert_eq!(
        target.transforms.get(knee).unwrap().world_position(),
        Vec3::new(4.0, 6.0, 6.0)
    );
}

#[test]
fn merge_gives_dangling_references_fresh_ids() {
    let mut target = Scene::new();
    let mut incoming = Scene::new();
    let object = incoming.create_object("orphan");
    let ghost = myth_scene::create_entity();
    incoming.objects.get_mut(object).unwrap().mesh = ghost;

    let remap = target.merge(incoming);
    let new_object = remap.get(object).unwrap();
    let new_ref = target.objects.get(new_object).unwrap().mesh;
    assert_ne!(new_ref, ghost);
    assert_eq!(remap.get(ghost), Some(new_ref));
}

// ============================================================================
// Deferred commands
// ============================================================================

#[test]
fn queued_merge_applies_at_update() {
    let mut scene = Scene::new();
    let sender = scene.command_sender();

    let ticket = thread::spawn(move || {
        let mut imported = Scene::new();
        imported.create_object("imported");
        sender.merge(imported)
    })
    .join()
    .unwrap();

    assert_eq!(scene.pending_commands(), 1);
    assert!(scene.find_by_name("imported").is_none());
    assert!(ticket.try_remap().is_none());

    scene.update(0.0);
    assert!(ticket.is_committed());
    assert!(!ticket.cancel());
    let imported = scene.find_by_name("imported").unwrap();
    let remap = ticket.try_remap().unwrap();
    assert_eq!(remap.len(), 1);
    assert!(remap.iter().any(|(_, new)| new == imported));
}

#[test]
fn cancelled_merge_is_dropped() {
    let mut scene = Scene::new();
    let mut imported = Scene::new();
    imported.create_object("never");
    let ticket = scene.command_sender().merge(imported);

    assert!(ticket.cancel());
    assert!(ticket.cancel());
    assert_eq!(scene.flush_commands(), 0);
    assert!(scene.find_by_name("never").is_none());
    assert!(ticket.is_cancelled());
}

#[test]
fn queued_removal_waits_for_safe_point() {
    let mut scene = Scene::new();
    let node = scene.create_node("doomed");
    scene.command_sender().remove(node);
    assert!(scene.contains_entity(node));
    assert_eq!(scene.flush_commands(), 1);
    assert!(!scene.contains_entity(node));
}
