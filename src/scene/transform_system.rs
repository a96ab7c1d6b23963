//! Transform System
//!
//! Resolves world matrices in two passes, each borrowing only the tables it
//! needs instead of the whole `Scene`:
//!
//! 1. [`run_transform_update`]: local SRT → un-parented world matrix, for every
//!    dirty transform. Rows are independent, so large tables are dispatched
//!    across the rayon pool.
//! 2. [`run_hierarchy_update`]: `world = parent.world * inverse_bind * local`
//!    for every parented entity, as one linear pass over the hierarchy table.
//!
//! # Ordering
//!
//! The hierarchy pass relies on the table being sorted parent-before-child
//! (see [`sort_hierarchy`](crate::scene::hierarchy::sort_hierarchy)). The scene
//! re-sorts whenever the hierarchy structure changes, so a child attached
//! before its parent still resolves within the same tick.

use glam::Affine3A;
use rayon::prelude::*;

use crate::ecs::ComponentManager;
use crate::scene::hierarchy::HierarchyComponent;
use crate::scene::transform::TransformComponent;

/// Recomputes the local (un-parented) world matrix of every dirty transform.
///
/// Tables with at least `parallel_threshold` rows are processed in parallel;
/// the call returns only once every row is done.
///
/// Returns the number of transforms that were recomputed.
pub fn run_transform_update(
    transforms: &mut ComponentManager<TransformComponent>,
    parallel_threshold: usize,
) -> usize {
    let rows = transforms.components_mut();

    if rows.len() >= parallel_threshold {
        rows.par_iter_mut()
            .map(|transform| usize::from(transform.update_transform()))
            .sum()
    } else {
        rows.iter_mut()
            .map(|transform| usize::from(transform.update_transform()))
            .sum()
    }
}

/// Resolves parent-relative world matrices.
///
/// For each hierarchy row whose entity owns a transform:
/// - parent has a transform: `world = parent.world * inverse_bind * local`
/// - parent missing (removed, never existed, or the chain is cyclic): the
///   entity is a root and its world matrix is reset to the local one.
///
/// Never faults on dangling references and visits each row exactly once.
pub fn run_hierarchy_update(
    hierarchy: &ComponentManager<HierarchyComponent>,
    transforms: &mut ComponentManager<TransformComponent>,
) {
    for (entity, link) in hierarchy.iter() {
        // 父节点失效（已删除、无 Transform、成环）时按根节点处理
        let parent_world: Option<Affine3A> = if link.cyclic || link.parent == entity {
            None
        } else {
            transforms.get(link.parent).map(|parent| parent.world)
        };

        let Some(child) = transforms.get_mut(entity) else {
            continue;
        };

        match parent_world {
            Some(parent_world) => {
                child.update_transform_parented(&parent_world, &link.world_parent_inverse_bind);
            }
            None => child.reset_to_local(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::create_entity;
    use crate::scene::hierarchy::sort_hierarchy;
    use glam::Vec3;

    #[test]
    fn test_hierarchy_update() {
        let mut transforms = ComponentManager::<TransformComponent>::new();
        let mut hierarchy = ComponentManager::<HierarchyComponent>::new();

        let parent = create_entity();
        let child = create_entity();

        transforms.create(parent).set_translation(Vec3::new(1.0, 0.0, 0.0));
        transforms.create(child).set_translation(Vec3::new(0.0, 1.0, 0.0));
        hierarchy.insert(child, HierarchyComponent::new(parent, Affine3A::IDENTITY));

        run_transform_update(&mut transforms, usize::MAX);
        run_hierarchy_update(&hierarchy, &mut transforms);

        let pos = transforms.get(child).unwrap().world_position();
        assert!((pos - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn child_inserted_before_parent_resolves_after_sort() {
        let mut transforms = ComponentManager::<TransformComponent>::new();
        let mut hierarchy = ComponentManager::<HierarchyComponent>::new();

        let root = create_entity();
        let mid = create_entity();
        let leaf = create_entity();
        for e in [root, mid, leaf] {
            transforms.create(e).set_translation(Vec3::X);
        }
        // leaf row first, its parent row second
        hierarchy.insert(leaf, HierarchyComponent::new(mid, Affine3A::IDENTITY));
        hierarchy.insert(mid, HierarchyComponent::new(root, Affine3A::IDENTITY));

        assert_eq!(sort_hierarchy(&mut hierarchy, 64), 0);
        assert_eq!(hierarchy.entity_at(0), Some(mid));

        run_transform_update(&mut transforms, 0);
        run_hierarchy_update(&hierarchy, &mut transforms);

        let pos = transforms.get(leaf).unwrap().world_position();
        assert!((pos - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn cycle_is_flagged_and_resolved_as_roots() {
        let mut transforms = ComponentManager::<TransformComponent>::new();
        let mut hierarchy = ComponentManager::<HierarchyComponent>::new();

        let a = create_entity();
        let b = create_entity();
        transforms.create(a).set_translation(Vec3::X);
        transforms.create(b).set_translation(Vec3::Y);
        hierarchy.insert(a, HierarchyComponent::new(b, Affine3A::IDENTITY));
        hierarchy.insert(b, HierarchyComponent::new(a, Affine3A::IDENTITY));

        assert_eq!(sort_hierarchy(&mut hierarchy, 64), 2);

        run_transform_update(&mut transforms, usize::MAX);
        for _ in 0..3 {
            run_hierarchy_update(&hierarchy, &mut transforms);
        }
        assert_eq!(transforms.get(a).unwrap().world_position(), Vec3::X);
        assert_eq!(transforms.get(b).unwrap().world_position(), Vec3::Y);
    }
}
