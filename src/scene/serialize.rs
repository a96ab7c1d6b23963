//! Scene Serialization
//!
//! Two granularities share the same [`Archive`]:
//!
//! - **Entity records** ([`EntityRecord`]): every component of one entity.
//!   Used for duplication, undo/redo snapshots and the clipboard. Records are
//!   read back under a *seed*: seed `0` restores the stored IDs verbatim, any
//!   other seed derives new IDs with [`derive_entity`].
//! - **Whole scene** ([`Scene::save`] / [`Scene::load`]): every table, with
//!   persistent IDs.
//!
//! Every read decodes and validates the complete payload before the scene is
//! touched, so a malformed or mismatched archive leaves the target unmodified.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::animation::AnimationComponent;
use crate::archive::Archive;
use crate::ecs::{ComponentManager, Entity, EntityRefs, create_entity, derive_entity};
use crate::errors::{Result, SceneError};
use crate::scene::Scene;
use crate::scene::armature::ArmatureComponent;
use crate::scene::components::{
    MaterialComponent, MeshComponent, NameComponent, ObjectComponent, RigidBodyPhysicsComponent,
};
use crate::scene::hierarchy::HierarchyComponent;
use crate::scene::transform::TransformComponent;

/// All components of one entity, as stored in an archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity: Entity,
    pub name: Option<NameComponent>,
    pub transform: Option<TransformComponent>,
    pub hierarchy: Option<HierarchyComponent>,
    pub material: Option<MaterialComponent>,
    pub mesh: Option<MeshComponent>,
    pub object: Option<ObjectComponent>,
    pub armature: Option<ArmatureComponent>,
    pub animation: Option<AnimationComponent>,
    pub rigidbody: Option<RigidBodyPhysicsComponent>,
}

impl EntityRefs for EntityRecord {
    fn remap_entities(&mut self, map: &mut impl FnMut(Entity) -> Entity) {
        if let Some(hierarchy) = &mut self.hierarchy {
            hierarchy.remap_entities(map);
        }
        if let Some(mesh) = &mut self.mesh {
            mesh.remap_entities(map);
        }
        if let Some(object) = &mut self.object {
            object.remap_entities(map);
        }
        if let Some(armature) = &mut self.armature {
            armature.remap_entities(map);
        }
        if let Some(animation) = &mut self.animation {
            animation.remap_entities(map);
        }
    }
}

#[derive(Serialize)]
struct TablesRef<'a> {
    names: &'a ComponentManager<NameComponent>,
    transforms: &'a ComponentManager<TransformComponent>,
    hierarchy: &'a ComponentManager<HierarchyComponent>,
    materials: &'a ComponentManager<MaterialComponent>,
    meshes: &'a ComponentManager<MeshComponent>,
    objects: &'a ComponentManager<ObjectComponent>,
    armatures: &'a ComponentManager<ArmatureComponent>,
    animations: &'a ComponentManager<AnimationComponent>,
    rigidbodies: &'a ComponentManager<RigidBodyPhysicsComponent>,
}

#[derive(Deserialize)]
struct TablesOwned {
    names: ComponentManager<NameComponent>,
    transforms: ComponentManager<TransformComponent>,
    hierarchy: ComponentManager<HierarchyComponent>,
    materials: ComponentManager<MaterialComponent>,
    meshes: ComponentManager<MeshComponent>,
    objects: ComponentManager<ObjectComponent>,
    armatures: ComponentManager<ArmatureComponent>,
    animations: ComponentManager<AnimationComponent>,
    rigidbodies: ComponentManager<RigidBodyPhysicsComponent>,
}

impl Scene {
    // ========================================================================
    // Records
    // ========================================================================

    /// Collects every component of `entity`. `None` if it owns none.
    #[must_use]
    pub fn capture_entity(&self, entity: Entity) -> Option<EntityRecord> {
        if !self.contains_entity(entity) {
            return None;
        }
        Some(EntityRecord {
            entity,
            name: self.names.get(entity).cloned(),
            transform: self.transforms.get(entity).cloned(),
            hierarchy: self.hierarchy.get(entity).cloned(),
            material: self.materials.get(entity).cloned(),
            mesh: self.meshes.get(entity).cloned(),
            object: self.objects.get(entity).cloned(),
            armature: self.armatures.get(entity).cloned(),
            animation: self.animations.get(entity).cloned(),
            rigidbody: self.rigidbodies.get(entity).cloned(),
        })
    }

    /// Inserts every component of `record`, replacing whatever the entity
    /// already owned.
    pub fn restore_entity(&mut self, record: EntityRecord) {
        let entity = record.entity;
        self.remove_entity(entity);

        if let Some(c) = record.name {
            self.names.insert(entity, c);
        }
        if let Some(mut c) = record.transform {
            c.mark_dirty();
            self.transforms.insert(entity, c);
        }
        if let Some(c) = record.hierarchy {
            self.hierarchy.insert(entity, c);
            self.hierarchy_dirty = true;
        }
        if let Some(c) = record.material {
            self.materials.insert(entity, c);
        }
        if let Some(c) = record.mesh {
            self.meshes.insert(entity, c);
        }
        if let Some(c) = record.object {
            self.objects.insert(entity, c);
        }
        if let Some(c) = record.armature {
            self.armatures.insert(entity, c);
        }
        if let Some(c) = record.animation {
            self.animations.insert(entity, c);
        }
        if let Some(mut c) = record.rigidbody {
            c.invalidate_handle();
            self.rigidbodies.insert(entity, c);
        }
    }

    /// Writes every component of `entity` as one record.
    ///
    /// IDs are stored as they are; the seed is chosen when reading back.
    pub fn serialize_entity(&self, archive: &mut Archive, entity: Entity) -> Result<()> {
        let record = self
            .capture_entity(entity)
            .ok_or(SceneError::EntityNotFound(entity))?;
        archive.write(&record)
    }

    /// Reads one record written by [`serialize_entity`](Self::serialize_entity)
    /// and returns the entity it was restored as.
    ///
    /// - `seed == 0`: the stored ID is reused (an entity with that ID is
    ///   overwritten).
    /// - `seed != 0`: the ID becomes `derive_entity(seed, stored)`.
    /// - `propagate_seed_deep`: entity references inside the components are
    ///   derived with the same seed too. Without it they keep pointing at the
    ///   original targets.
    pub fn deserialize_entity(
        &mut self,
        archive: &mut Archive,
        seed: u64,
        propagate_seed_deep: bool,
    ) -> Result<Entity> {
        let mut record: EntityRecord = archive.read()?;
        if !record.entity.is_valid() {
            return Err(SceneError::InvalidEntity);
        }

        record.entity = derive_entity(seed, record.entity);
        if propagate_seed_deep {
            record.remap_entities(&mut |e| derive_entity(seed, e));
        }

        let entity = record.entity;
        self.restore_entity(record);
        Ok(entity)
    }

    /// Writes a group of entities as a single record. Entities without
    /// components are skipped. Returns how many were written.
    pub fn serialize_entities(&self, archive: &mut Archive, entities: &[Entity]) -> Result<usize> {
        let records: Vec<EntityRecord> = entities
            .iter()
            .filter_map(|&e| self.capture_entity(e))
            .collect();
        archive.write(&records)?;
        Ok(records.len())
    }

    /// Reads a group written by [`serialize_entities`](Self::serialize_entities).
    ///
    /// Works like [`deserialize_entity`](Self::deserialize_entity) for each
    /// member, except that deep propagation only re-derives references to other
    /// members of the group. References leaving the group keep their original
    /// target, so a pasted subtree stays attached where its source was.
    ///
    /// All-or-nothing: nothing is inserted unless the whole group decodes.
    pub fn deserialize_entities(
        &mut self,
        archive: &mut Archive,
        seed: u64,
        propagate_seed_deep: bool,
    ) -> Result<Vec<Entity>> {
        let mut records: Vec<EntityRecord> = archive.read()?;

        let mut members: FxHashSet<Entity> = FxHashSet::default();
        for record in &records {
            if !record.entity.is_valid() {
                return Err(SceneError::InvalidEntity);
            }
            if !members.insert(record.entity) {
                return Err(SceneError::DuplicateEntity(record.entity));
            }
        }

        let mut map = |e: Entity| {
            if members.contains(&e) {
                derive_entity(seed, e)
            } else {
                e
            }
        };
        for record in &mut records {
            record.entity = derive_entity(seed, record.entity);
            if propagate_seed_deep {
                record.remap_entities(&mut map);
            }
        }

        let restored: Vec<Entity> = records.iter().map(|r| r.entity).collect();
        for record in records {
            self.restore_entity(record);
        }
        Ok(restored)
    }

    /// Copies `entity` and its whole subtree under fresh IDs. The copy is
    /// attached to the same parent as the source. Returns the new root.
    pub fn duplicate_entity(&mut self, entity: Entity) -> Result<Entity> {
        if !self.contains_entity(entity) {
            return Err(SceneError::EntityNotFound(entity));
        }
        let group = self.subtree(entity);

        let mut archive = Archive::new();
        self.serialize_entities(&mut archive, &group)?;
        let mut archive = archive.into_reader()?;

        let seed = create_entity().to_raw();
        self.deserialize_entities(&mut archive, seed, true)?;
        Ok(derive_entity(seed, entity))
    }

    // ========================================================================
    // Whole scene
    // ========================================================================

    /// Writes every table with persistent IDs.
    pub fn save(&self, archive: &mut Archive) -> Result<()> {
        archive.write(&TablesRef {
            names: &self.names,
            transforms: &self.transforms,
            hierarchy: &self.hierarchy,
            materials: &self.materials,
            meshes: &self.meshes,
            objects: &self.objects,
            armatures: &self.armatures,
            animations: &self.animations,
            rigidbodies: &self.rigidbodies,
        })
    }

    /// Replaces the scene contents with a scene written by [`save`](Self::save).
    ///
    /// On error the scene is left exactly as it was.
    pub fn load(&mut self, archive: &mut Archive) -> Result<()> {
        let tables: TablesOwned = archive.read()?;

        self.names = tables.names;
        self.transforms = tables.transforms;
        self.hierarchy = tables.hierarchy;
        self.materials = tables.materials;
        self.meshes = tables.meshes;
        self.objects = tables.objects;
        self.armatures = tables.armatures;
        self.animations = tables.animations;
        self.rigidbodies = tables.rigidbodies;
        self.hierarchy_dirty = true;

        log::debug!("Loaded scene with {} entities", self.entities().len());
        Ok(())
    }
}
