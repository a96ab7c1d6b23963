use glam::Affine3A;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::ecs::{ComponentManager, Entity, EntityRefs};

/// Parent relation of an entity.
///
/// `parent` is a weak reference: the parent may have been removed, or may never
/// have existed in this scene. That is an expected state and the entity is then
/// treated as a root. The relation never owns the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyComponent {
    pub parent: Entity,
    /// Inverse of the parent's world matrix at the moment of attachment.
    ///
    /// Keeps a re-parented child at the same visual placement it had before
    /// the attach. Identity when the child was already expressed in parent
    /// space.
    pub world_parent_inverse_bind: Affine3A,

    /// Set by [`sort_hierarchy`] when the parent chain loops or exceeds the
    /// depth limit. Such rows are resolved as roots.
    #[serde(skip)]
    pub(crate) cyclic: bool,
}

impl Default for HierarchyComponent {
    fn default() -> Self {
        Self {
            parent: Entity::INVALID,
            world_parent_inverse_bind: Affine3A::IDENTITY,
            cyclic: false,
        }
    }
}

impl HierarchyComponent {
    #[must_use]
    pub fn new(parent: Entity, world_parent_inverse_bind: Affine3A) -> Self {
        Self {
            parent,
            world_parent_inverse_bind,
            cyclic: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }
}

impl EntityRefs for HierarchyComponent {
    fn remap_entities(&mut self, map: &mut impl FnMut(Entity) -> Entity) {
        self.parent = map(self.parent);
    }
}

/// Number of hierarchy links above `entity`, or `None` if the chain loops back
/// or is deeper than `max_depth`.
#[must_use]
pub fn hierarchy_depth(
    hierarchy: &ComponentManager<HierarchyComponent>,
    entity: Entity,
    max_depth: usize,
) -> Option<usize> {
    let mut depth = 0;
    let mut current = hierarchy.get(entity)?.parent;
    while let Some(link) = hierarchy.get(current) {
        depth += 1;
        if current == entity || depth > max_depth {
            return None;
        }
        current = link.parent;
    }
    Some(depth)
}

/// Re-sorts the hierarchy table so every parent row precedes its children.
///
/// The hierarchy system is a single linear pass, so table order is what makes
/// parent-before-child evaluation hold. Rows are stably sorted by depth; rows
/// whose chain is cyclic (or deeper than `max_depth`) are flagged and moved to
/// the end, where they are resolved as roots.
///
/// Returns the number of cyclic rows found.
pub fn sort_hierarchy(hierarchy: &mut ComponentManager<HierarchyComponent>, max_depth: usize) -> usize {
    let depths: FxHashMap<Entity, Option<usize>> = hierarchy
        .entities()
        .iter()
        .map(|&entity| (entity, hierarchy_depth(hierarchy, entity, max_depth)))
        .collect();

    let mut cyclic = 0;
    for (entity, component) in hierarchy.iter_mut() {
        component.cyclic = depths.get(&entity).copied().flatten().is_none();
        if component.cyclic {
            cyclic += 1;
        }
    }
    if cyclic > 0 {
        log::warn!(
            "Hierarchy has {cyclic} entities in a parent cycle or deeper than {max_depth}, resolving them as roots"
        );
    }

    hierarchy.sort_by_key(|entity, _| depths.get(&entity).copied().flatten().unwrap_or(usize::MAX));

    cyclic
}
