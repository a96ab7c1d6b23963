use glam::Affine3A;
use rustc_hash::FxHashSet;

use crate::animation::{AnimationComponent, run_animation_update};
use crate::ecs::{ComponentManager, Entity, EntityRefs, EntityRemap, create_entity};
use crate::scene::armature::{ArmatureComponent, run_armature_update};
use crate::scene::commands::{CommandQueue, CommandSender, SceneCommand, try_commit};
use crate::scene::components::{
    MaterialComponent, MeshComponent, NameComponent, ObjectComponent, RigidBodyPhysicsComponent,
};
use crate::scene::hierarchy::{HierarchyComponent, hierarchy_depth, sort_hierarchy};
use crate::scene::settings::SceneSettings;
use crate::scene::transform::TransformComponent;
use crate::scene::transform_system::{run_hierarchy_update, run_transform_update};

/// Expands `$body` once per component table, with `$table` bound to
/// `&mut ComponentManager<_>` of that table.
macro_rules! for_each_table {
    ($scene:expr, |$table:ident| $body:expr) => {{
        { let $table = &mut $scene.names; $body; }
        { let $table = &mut $scene.transforms; $body; }
        { let $table = &mut $scene.hierarchy; $body; }
        { let $table = &mut $scene.materials; $body; }
        { let $table = &mut $scene.meshes; $body; }
        { let $table = &mut $scene.objects; $body; }
        { let $table = &mut $scene.armatures; $body; }
        { let $table = &mut $scene.animations; $body; }
        { let $table = &mut $scene.rigidbodies; $body; }
    }};
}

/// Scene
///
/// Owns one [`ComponentManager`] per component type and runs the per-tick
/// update chain over them:
///
/// ```text
/// flush commands → animation → transform → hierarchy → armature
/// ```
///
/// Tables are public for reading and editing component data. The hierarchy
/// table is the exception: its row order is maintained by the scene, so it is
/// only mutable through [`attach`](Self::attach), [`detach`](Self::detach) and
/// entity removal.
#[derive(Debug, Default)]
pub struct Scene {
    pub names: ComponentManager<NameComponent>,
    pub transforms: ComponentManager<TransformComponent>,
    pub(crate) hierarchy: ComponentManager<HierarchyComponent>,
    pub materials: ComponentManager<MaterialComponent>,
    pub meshes: ComponentManager<MeshComponent>,
    pub objects: ComponentManager<ObjectComponent>,
    pub armatures: ComponentManager<ArmatureComponent>,
    pub animations: ComponentManager<AnimationComponent>,
    pub rigidbodies: ComponentManager<RigidBodyPhysicsComponent>,

    pub(crate) settings: SceneSettings,
    /// Set when hierarchy rows were added or re-parented. The table is re-sorted
    /// before the next hierarchy pass.
    pub(crate) hierarchy_dirty: bool,
    pub(crate) commands: CommandQueue,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(settings: SceneSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SceneSettings) {
        self.settings = settings;
        self.hierarchy_dirty = true;
    }

    #[inline]
    #[must_use]
    pub fn hierarchy(&self) -> &ComponentManager<HierarchyComponent> {
        &self.hierarchy
    }

    // ========================================================================
    // Factories (importer boundary)
    // ========================================================================

    /// Creates a bare transform node (bones, empties).
    pub fn create_node(&mut self, name: &str) -> Entity {
        let entity = create_entity();
        self.names.insert(entity, NameComponent::new(name));
        self.transforms.create(entity);
        entity
    }

    /// Creates a placed object: name, transform and an [`ObjectComponent`]
    /// without a mesh.
    pub fn create_object(&mut self, name: &str) -> Entity {
        let entity = self.create_node(name);
        self.objects.create(entity);
        entity
    }

    pub fn create_mesh(&mut self, name: &str) -> Entity {
        let entity = create_entity();
        self.names.insert(entity, NameComponent::new(name));
        self.meshes.create(entity);
        entity
    }

    pub fn create_material(&mut self, name: &str) -> Entity {
        let entity = create_entity();
        self.names.insert(entity, NameComponent::new(name));
        self.materials.create(entity);
        entity
    }

    /// Creates an armature with its own transform, so it can be parented
    /// like any node.
    pub fn create_armature(&mut self, name: &str) -> Entity {
        let entity = self.create_node(name);
        self.armatures.create(entity);
        entity
    }

    pub fn create_animation(&mut self, name: &str) -> Entity {
        let entity = create_entity();
        self.names.insert(entity, NameComponent::new(name));
        self.animations.create(entity);
        entity
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Parents `child` to `parent`, keeping the child where it currently is in
    /// world space.
    ///
    /// The inverse of the parent's last resolved world matrix is captured as the
    /// bind matrix. A child that already had a parent is detached first.
    /// Attaching an entity to itself or to one of its own descendants is
    /// refused with a warning.
    pub fn attach(&mut self, child: Entity, parent: Entity) {
        let inverse_bind = self
            .transforms
            .get(parent)
            .map_or(Affine3A::IDENTITY, |t| t.world_matrix().inverse());
        self.attach_with_bind(child, parent, inverse_bind);
    }

    /// Parents `child` to `parent` when the child's local SRT is already
    /// expressed in the parent's space (importers).
    pub fn attach_local(&mut self, child: Entity, parent: Entity) {
        self.attach_with_bind(child, parent, Affine3A::IDENTITY);
    }

    fn attach_with_bind(&mut self, child: Entity, parent: Entity, inverse_bind: Affine3A) {
        if child == parent || !child.is_valid() || !parent.is_valid() {
            log::warn!("Refusing to attach {child} to {parent}");
            return;
        }
        if self.is_descendant_of(parent, child) {
            log::warn!("Refusing to attach {child} to its own descendant {parent}");
            return;
        }

        if self.hierarchy.contains(child) {
            self.detach(child);
        }

        self.hierarchy
            .insert(child, HierarchyComponent::new(parent, inverse_bind));
        self.hierarchy_dirty = true;

        if self.settings.sort_hierarchy_on_attach {
            self.sort_hierarchy_now();
        }
    }

    /// Removes the parent link of `entity` and bakes its last world matrix into
    /// its local SRT, so it stays in place. No-op for roots.
    pub fn detach(&mut self, entity: Entity) {
        // Order-preserving removal keeps the table topologically sorted
        if self.hierarchy.remove_keep_sorted(entity).is_none() {
            return;
        }
        if let Some(transform) = self.transforms.get_mut(entity) {
            transform.apply_world();
        }
    }

    /// Detaches every direct child of `parent`.
    pub fn detach_children(&mut self, parent: Entity) {
        let children: Vec<Entity> = self
            .hierarchy
            .iter()
            .filter(|(_, link)| link.parent == parent)
            .map(|(entity, _)| entity)
            .collect();
        for child in children {
            self.detach(child);
        }
    }

    /// Parent of `entity`, if it has a hierarchy link.
    #[must_use]
    pub fn parent_of(&self, entity: Entity) -> Option<Entity> {
        self.hierarchy.get(entity).map(|link| link.parent)
    }

    /// Whether `ancestor` appears in the parent chain of `entity`.
    #[must_use]
    pub fn is_descendant_of(&self, entity: Entity, ancestor: Entity) -> bool {
        let mut current = entity;
        for _ in 0..=self.settings.max_hierarchy_depth {
            match self.hierarchy.get(current) {
                Some(link) if link.parent == ancestor => return true,
                Some(link) => current = link.parent,
                None => return false,
            }
        }
        false
    }

    /// `entity` followed by all of its descendants, parents before children.
    #[must_use]
    pub fn subtree(&self, entity: Entity) -> Vec<Entity> {
        let mut result = vec![entity];
        let mut seen: FxHashSet<Entity> = FxHashSet::default();
        seen.insert(entity);

        let mut frontier = 0;
        while frontier < result.len() {
            let parent = result[frontier];
            frontier += 1;
            for (child, link) in self.hierarchy.iter() {
                if link.parent == parent && seen.insert(child) {
                    result.push(child);
                }
            }
        }
        result
    }

    /// Number of links above `entity`; `None` for cyclic or over-deep chains.
    #[must_use]
    pub fn depth_of(&self, entity: Entity) -> Option<usize> {
        hierarchy_depth(&self.hierarchy, entity, self.settings.max_hierarchy_depth)
    }

    fn sort_hierarchy_now(&mut self) {
        sort_hierarchy(&mut self.hierarchy, self.settings.max_hierarchy_depth);
        self.hierarchy_dirty = false;
    }

    // ========================================================================
    // Entity lifetime
    // ========================================================================

    /// Removes every component of `entity`.
    ///
    /// Children are left in place with a dangling parent and are resolved as
    /// roots from the next update on. Armatures that list the entity as a bone
    /// keep that bone's last matrix.
    pub fn remove_entity(&mut self, entity: Entity) {
        self.names.remove(entity);
        self.transforms.remove(entity);
        self.hierarchy.remove_keep_sorted(entity);
        self.materials.remove(entity);
        self.meshes.remove(entity);
        self.objects.remove(entity);
        self.armatures.remove(entity);
        self.animations.remove(entity);
        self.rigidbodies.remove(entity);
    }

    /// Removes `entity` and all of its descendants.
    pub fn remove_entity_recursive(&mut self, entity: Entity) {
        for e in self.subtree(entity) {
            self.remove_entity(e);
        }
    }

    #[must_use]
    pub fn contains_entity(&self, entity: Entity) -> bool {
        self.names.contains(entity)
            || self.transforms.contains(entity)
            || self.hierarchy.contains(entity)
            || self.materials.contains(entity)
            || self.meshes.contains(entity)
            || self.objects.contains(entity)
            || self.armatures.contains(entity)
            || self.animations.contains(entity)
            || self.rigidbodies.contains(entity)
    }

    /// Every entity owning at least one component, sorted by ID.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        let mut all: FxHashSet<Entity> = FxHashSet::default();
        all.extend(self.names.entities());
        all.extend(self.transforms.entities());
        all.extend(self.hierarchy.entities());
        all.extend(self.materials.entities());
        all.extend(self.meshes.entities());
        all.extend(self.objects.entities());
        all.extend(self.armatures.entities());
        all.extend(self.animations.entities());
        all.extend(self.rigidbodies.entities());
        let mut all: Vec<Entity> = all.into_iter().collect();
        all.sort_unstable();
        all
    }

    /// First entity whose name component equals `name`.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<Entity> {
        self.names
            .iter()
            .find(|(_, component)| component.name == name)
            .map(|(entity, _)| entity)
    }

    /// Empties every table. Queued commands are kept.
    pub fn clear(&mut self) {
        for_each_table!(self, |table| table.clear());
        self.hierarchy_dirty = false;
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Moves every entity of `other` into this scene under fresh IDs.
    ///
    /// One remap table covers every entity `other` knows about (table keys and
    /// references alike), and every entity-valued field is rewritten through it
    /// before the tables are appended. Merged IDs therefore never alias IDs in
    /// `self`. Physics handles of merged bodies are cleared.
    pub fn merge(&mut self, mut other: Scene) -> EntityRemap {
        let mut remap = EntityRemap::new();
        // 1. 重映射 other 的所有 ID（包括组件内的引用）
        {
            let mut map = |entity: Entity| remap.map_or_create(entity);
            other.remap_entities(&mut map);
        }
        // 2. 物理句柄属于旧世界
        for body in other.rigidbodies.components_mut() {
            body.invalidate_handle();
        }

        // 3. 追加所有表
        self.names.merge(&mut other.names);
        self.transforms.merge(&mut other.transforms);
        self.hierarchy.merge(&mut other.hierarchy);
        self.materials.merge(&mut other.materials);
        self.meshes.merge(&mut other.meshes);
        self.objects.merge(&mut other.objects);
        self.armatures.merge(&mut other.armatures);
        self.animations.merge(&mut other.animations);
        self.rigidbodies.merge(&mut other.rigidbodies);
        self.hierarchy_dirty = true;

        log::debug!("Merged {} entities into scene", remap.len());
        remap
    }

    /// Rewrites every table key and every entity-valued component field.
    pub(crate) fn remap_entities(&mut self, map: &mut impl FnMut(Entity) -> Entity) {
        for_each_table!(self, |table| table.remap_keys(&mut *map));

        for link in self.hierarchy.components_mut() {
            link.remap_entities(&mut *map);
        }
        for mesh in self.meshes.components_mut() {
            mesh.remap_entities(&mut *map);
        }
        for object in self.objects.components_mut() {
            object.remap_entities(&mut *map);
        }
        for armature in self.armatures.components_mut() {
            armature.remap_entities(&mut *map);
        }
        for animation in self.animations.components_mut() {
            animation.remap_entities(&mut *map);
        }
    }

    // ========================================================================
    // Deferred commands
    // ========================================================================

    /// Producer handle for off-tick threads.
    #[must_use]
    pub fn command_sender(&self) -> CommandSender {
        self.commands.sender()
    }

    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Applies every queued command in submission order. Returns how many were
    /// applied (cancelled merges are dropped and not counted).
    pub fn flush_commands(&mut self) -> usize {
        let queued: Vec<SceneCommand> = self.commands.drain().collect();
        let mut applied = 0;
        for command in queued {
            match command {
                SceneCommand::Merge {
                    scene,
                    state,
                    remap,
                } => {
                    if !try_commit(&state) {
                        log::debug!("Dropping cancelled merge");
                        continue;
                    }
                    let table = self.merge(*scene);
                    // The ticket may already be gone
                    let _ = remap.try_send(table);
                    applied += 1;
                }
                SceneCommand::Remove(entity) => {
                    self.remove_entity(entity);
                    applied += 1;
                }
            }
        }
        if applied > 0 {
            log::debug!("Flushed {applied} scene commands");
        }
        applied
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Advances the scene by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        // 1. 安全点：应用导入线程排队的合并 / 删除
        self.flush_commands();

        // 2. 动画写入 local SRT
        run_animation_update(&mut self.animations, &mut self.transforms, dt);

        // 3. local -> world (无父节点)
        run_transform_update(&mut self.transforms, self.settings.parallel_threshold);

        // 4. 层级：结构变化后先重排，保证父节点在子节点之前
        if self.hierarchy_dirty {
            self.sort_hierarchy_now();
        }
        run_hierarchy_update(&self.hierarchy, &mut self.transforms);

        // 5. 蒙皮矩阵
        run_armature_update(
            &mut self.armatures,
            &self.transforms,
            self.settings.parallel_threshold,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn attach_refuses_cycles() {
        let mut scene = Scene::new();
        let a = scene.create_node("a");
        let b = scene.create_node("b");
        scene.attach_local(b, a);
        scene.attach_local(a, b);
        assert_eq!(scene.parent_of(a), None);
        assert_eq!(scene.parent_of(b), Some(a));

        scene.attach_local(a, a);
        assert_eq!(scene.parent_of(a), None);
    }

    #[test]
    fn subtree_lists_parents_first() {
        let mut scene = Scene::new();
        let root = scene.create_node("root");
        let child = scene.create_node("child");
        let grandchild = scene.create_node("grandchild");
        scene.attach_local(grandchild, child);
        scene.attach_local(child, root);
        assert_eq!(scene.subtree(root), vec![root, child, grandchild]);
    }

    #[test]
    fn detach_keeps_world_placement() {
        let mut scene = Scene::new();
        let parent = scene.create_node("parent");
        let child = scene.create_node("child");
        scene.transforms.get_mut(parent).unwrap().set_translation(Vec3::new(0.0, 5.0, 0.0));
        scene.transforms.get_mut(child).unwrap().set_translation(Vec3::X);
        scene.attach_local(child, parent);
        scene.update(0.0);

        scene.detach(child);
        scene.update(0.0);
        let pos = scene.transforms.get(child).unwrap().world_position();
        assert!((pos - Vec3::new(1.0, 5.0, 0.0)).length() < 1e-5);
    }
}
