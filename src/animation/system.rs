use crate::animation::component::AnimationComponent;
use crate::ecs::ComponentManager;
use crate::scene::transform::TransformComponent;

/// Advances every playing animation by `dt` and samples it into its targets.
///
/// Runs sequentially: two animations may drive the same transform, and the
/// later row in the table wins.
pub fn run_animation_update(
    animations: &mut ComponentManager<AnimationComponent>,
    transforms: &mut ComponentManager<TransformComponent>,
    dt: f32,
) {
    for animation in animations.components_mut() {
        if animation.advance(dt) {
            let time = animation.timer;
            animation.sample_at(time, transforms);
        }
    }
}
