use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use glam::{Affine3A, Vec3};
use myth_scene::animation::{AnimationChannel, AnimationPath, AnimationSampler, SamplerMode};
use myth_scene::{AnimationComponent, ArmatureComponent, Scene, SceneSettings};

/// Builds `chains` parent chains of `depth` nodes, one armature over each
/// chain and one looping animation driving every chain root.
fn build_scene(chains: usize, depth: usize, settings: SceneSettings) -> Scene {
    let mut scene = Scene::with_settings(settings);
    let mut roots = Vec::with_capacity(chains);

    for c in 0..chains {
        let mut bones = Vec::with_capacity(depth);
        let mut parent = None;
        for d in 0..depth {
            let node = scene.create_node(&format!("bone_{c}_{d}"));
            scene
                .transforms
                .get_mut(node)
                .unwrap()
                .set_translation(Vec3::new(0.0, 1.0, 0.0));
            if let Some(p) = parent {
                scene.attach_local(node, p);
            }
            parent = Some(node);
            bones.push(node);
        }
        roots.push(bones[0]);

        let armature = scene.create_armature(&format!("armature_{c}"));
        let ibms = vec![Affine3A::IDENTITY; bones.len()];
        *scene.armatures.get_mut(armature).unwrap() = ArmatureComponent::new(bones, ibms);
    }

    let channels = roots
        .iter()
        .map(|&root| AnimationChannel::new(root, AnimationPath::Translation, 0))
        .collect();
    let sampler = AnimationSampler::new(
        SamplerMode::Linear,
        vec![0.0, 1.0, 2.0],
        vec![0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );
    let anim = scene.create_animation("sway");
    let component = scene.animations.get_mut(anim).unwrap();
    *component = AnimationComponent::new(channels, vec![sampler]);
    component.set_looped(true);
    component.play();

    scene.update(0.0);
    scene
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("Scene Update");

    let mut sequential = build_scene(
        200,
        20,
        SceneSettings {
            parallel_threshold: usize::MAX,
            ..SceneSettings::default()
        },
    );
    group.bench_function("4k nodes, sequential", |b| {
        b.iter(|| sequential.update(black_box(1.0 / 60.0)));
    });

    let mut parallel = build_scene(
        200,
        20,
        SceneSettings {
            parallel_threshold: 64,
            ..SceneSettings::default()
        },
    );
    group.bench_function("4k nodes, rayon", |b| {
        b.iter(|| parallel.update(black_box(1.0 / 60.0)));
    });

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    c.bench_function("Merge 4k-node scene", |b| {
        b.iter_batched(
            || (Scene::new(), build_scene(200, 20, SceneSettings::default())),
            |(mut target, incoming)| black_box(target.merge(incoming)),
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_update, bench_merge);
criterion_main!(benches);
